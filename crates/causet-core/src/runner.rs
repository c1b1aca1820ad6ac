//! Tick scheduler: the `Idle -> Running -> Stopped` state machine.
//!
//! [`Scheduler::run`] drives [`run_tick`] in a loop on the calling thread,
//! checking the shared [`SchedulerControl`] between ticks for:
//!
//! - **Bounded runs**: stop after `max_ticks` or `max_real_time_seconds`
//! - **Stop requests**: clean stop after the current tick
//! - **Pacing**: an optional sleep between ticks, adjustable at runtime
//! - **Extinction**: stop once a non-empty registry has emptied
//!
//! After each tick the caller-supplied [`TickCallback`] sees the summary and
//! the post-tick substrate. A failing tick stops the scheduler for good.

use std::sync::Arc;
use std::time::Duration;

use causet_types::Scalar;
use tracing::{error, info, warn};

use crate::control::{SchedulerControl, StopReason};
use crate::substrate::Substrate;
use crate::tick::{self, TickError, TickRules, TickSummary};

/// Errors returned by [`Scheduler::run`].
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `run` was called on a scheduler that already stopped.
    #[error("scheduler already stopped")]
    AlreadyStopped,

    /// A tick failed; the scheduler is now stopped.
    #[error("tick {tick} failed: {source}")]
    Tick {
        /// The tick that failed.
        tick: Scalar,
        /// The underlying tick error.
        source: TickError,
    },
}

/// Lifecycle state of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, not yet run.
    Idle,
    /// Inside [`Scheduler::run`].
    Running,
    /// Terminal.
    Stopped,
}

/// Callback invoked after each tick completes.
///
/// This is the only per-tick hook. It runs on the producer thread, so
/// implementations must be fast or hand their work off elsewhere.
pub trait TickCallback: Send {
    /// Called after phase 4 of every successful tick. An error is fatal:
    /// the scheduler stops with [`StopReason::TickFailed`].
    fn on_tick(&mut self, summary: &TickSummary, substrate: &Substrate) -> Result<(), TickError>;
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _substrate: &Substrate) -> Result<(), TickError> {
        Ok(())
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunResult {
    /// Why the run ended.
    pub stop_reason: StopReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Ticks executed by this run.
    pub total_ticks: u64,
}

/// Owns a substrate and advances it tick by tick.
#[derive(Debug)]
pub struct Scheduler {
    substrate: Substrate,
    rules: TickRules,
    control: Arc<SchedulerControl>,
    state: SchedulerState,
    stop_reason: Option<StopReason>,
}

impl Scheduler {
    /// Create an idle scheduler.
    pub const fn new(substrate: Substrate, rules: TickRules, control: Arc<SchedulerControl>) -> Self {
        Self {
            substrate,
            rules,
            control,
            state: SchedulerState::Idle,
            stop_reason: None,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Why the scheduler stopped, once it has.
    pub const fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// The substrate being driven.
    pub const fn substrate(&self) -> &Substrate {
        &self.substrate
    }

    /// The shared control handle.
    pub const fn control(&self) -> &Arc<SchedulerControl> {
        &self.control
    }

    /// Give back the substrate.
    pub fn into_substrate(self) -> Substrate {
        self.substrate
    }

    /// Run until a termination condition is met.
    ///
    /// Blocks the calling thread. On return the scheduler is `Stopped`
    /// whatever the outcome.
    pub fn run(&mut self, callback: &mut dyn TickCallback) -> Result<RunResult, SchedulerError> {
        match self.state {
            SchedulerState::Stopped => return Err(SchedulerError::AlreadyStopped),
            SchedulerState::Idle | SchedulerState::Running => {}
        }
        self.state = SchedulerState::Running;

        let started_non_empty = !self.substrate.is_empty();
        let mut last_summary: Option<TickSummary> = None;
        let mut total_ticks: u64 = 0;

        info!(
            dimensions = self.substrate.dimensions(),
            entities = self.substrate.len(),
            max_ticks = self.control.max_ticks(),
            max_real_time_seconds = self.control.max_real_time_seconds(),
            tick_interval_ms = self.control.tick_interval_ms(),
            collapse_period = self.rules.collapse_period,
            "Scheduler starting"
        );

        let stop_reason = loop {
            // --- Check stop request (before tick) ---
            if self.control.is_stop_requested() {
                info!("Stop requested");
                break StopReason::StopRequested;
            }

            // --- Check time limit (before tick) ---
            if self.control.time_limit_reached() {
                info!(
                    max_seconds = self.control.max_real_time_seconds(),
                    elapsed = self.control.elapsed_seconds(),
                    "Real-time limit reached"
                );
                break StopReason::MaxRealTimeReached;
            }

            // --- Execute tick ---
            let summary = match tick::run_tick(&mut self.substrate, &self.rules) {
                Ok(summary) => summary,
                Err(source) => return Err(self.fail(source)),
            };
            total_ticks = total_ticks.saturating_add(1);

            // --- Notify callback ---
            if let Err(source) = callback.on_tick(&summary, &self.substrate) {
                return Err(self.fail(source));
            }

            let extinct = started_non_empty && summary.alive == 0;
            let limit = self.control.tick_limit_reached(&summary.tick);
            if extinct || limit {
                info!(
                    tick = %summary.tick,
                    max_ticks = self.control.max_ticks(),
                    extinct,
                    "Run boundary reached"
                );
                last_summary = Some(summary);
                break if extinct {
                    StopReason::Extinction
                } else {
                    StopReason::MaxTicksReached
                };
            }
            last_summary = Some(summary);

            // --- Sleep for tick interval ---
            let interval_ms = self.control.tick_interval_ms();
            if interval_ms > 0 {
                std::thread::sleep(Duration::from_millis(interval_ms));
            }
        };

        self.state = SchedulerState::Stopped;
        self.stop_reason = Some(stop_reason);
        Ok(RunResult {
            stop_reason,
            final_summary: last_summary,
            total_ticks,
        })
    }
}

impl Scheduler {
    fn fail(&mut self, source: TickError) -> SchedulerError {
        let tick = self.substrate.tick().clone();
        error!(tick = %tick, error = %source, "Tick failed, stopping scheduler");
        self.state = SchedulerState::Stopped;
        self.stop_reason = Some(StopReason::TickFailed);
        SchedulerError::Tick { tick, source }
    }
}

/// Log the end of a run.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.stop_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick.to_string()),
        final_alive = result.final_summary.as_ref().map(|s| s.alive),
        "Run ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = %summary.tick,
            alive = summary.alive,
            total_energy_loss = %summary.total_energy_loss,
            relations = summary.relations,
            extent = %summary.extent,
            "Final tick summary"
        );
    } else {
        warn!("Run ended with no ticks executed");
    }
}
