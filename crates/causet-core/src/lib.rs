//! Substrate, tick cycle, and scheduler for the causet simulation.
//!
//! This crate owns the four-phase tick cycle that drives the simulation:
//! Compute, Grow, Apply-Law, and Collapse.
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter with period-boundary checks.
//! - [`config`] -- Configuration loading from `causet-config.yaml` into
//!   strongly-typed structs.
//! - [`control`] -- [`SchedulerControl`] stop flag, limits, and pacing.
//! - [`relations`] -- [`CausalGraph`] and its bounded collapse.
//! - [`runner`] -- The [`Scheduler`] state machine and [`TickCallback`].
//! - [`substrate`] -- The entity registry and per-phase primitives.
//! - [`tick`] -- The four-phase tick cycle.
//!
//! [`SchedulerControl`]: control::SchedulerControl
//! [`CausalGraph`]: relations::CausalGraph
//! [`Scheduler`]: runner::Scheduler
//! [`TickCallback`]: runner::TickCallback

pub mod clock;
pub mod config;
pub mod control;
pub mod relations;
pub mod runner;
pub mod substrate;
pub mod tick;

pub use config::SimulationConfig;
pub use control::{SchedulerControl, StopReason};
pub use runner::{NoOpCallback, RunResult, Scheduler, SchedulerError, SchedulerState, TickCallback};
pub use substrate::{Substrate, SubstrateError};
pub use tick::{TickError, TickRules, TickSummary, run_tick};
