//! Producer/consumer hand-off between the tick loop and downstream sinks.
//!
//! The scheduler's [`SamplingCallback`] assembles a [`Snapshot`] every
//! `sample_interval` ticks and pushes one shared `Arc` into each consumer's
//! bounded [`SnapshotBuffer`] lane. Each consumer thread runs
//! [`run_consumer`], which pops snapshots, computes the backward
//! [`SnapshotDelta`] against the last snapshot it saw, and hands both to its
//! [`SnapshotSink`].
//!
//! # Modules
//!
//! - [`buffer`] -- Bounded mutex/condvar FIFO with an explicit overflow policy
//! - [`sampler`] -- Per-tick sampling callback
//! - [`consumer`] -- Consumer loop, sink trait, lag gauge
//! - [`delta`] -- Backward snapshot difference
//! - [`error`] -- Buffer and sink errors
//!
//! [`Snapshot`]: causet_types::Snapshot

pub mod buffer;
pub mod consumer;
pub mod delta;
pub mod error;
pub mod sampler;

pub use buffer::{BufferStats, PopResult, PushOutcome, SnapshotBuffer};
pub use consumer::{
    ConsumerControl, ConsumerExit, ConsumerReport, LagGauge, LagReading, ShutdownMode,
    SnapshotSink, run_consumer,
};
pub use delta::SnapshotDelta;
pub use error::{BufferError, SinkError};
pub use sampler::SamplingCallback;
