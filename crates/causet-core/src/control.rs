//! Shared scheduler control state.
//!
//! [`SchedulerControl`] is wrapped in an [`Arc`](std::sync::Arc) and shared
//! between the producer thread running the tick loop and whoever may ask it
//! to stop (the engine's Ctrl-C handler, tests). All mutable fields are
//! atomics so the tick loop never takes a lock to read them.
//!
//! Every check here is made between ticks, never mid-phase.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use causet_types::Scalar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScheduleConfig;

/// Reason a scheduler run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// [`SchedulerControl::request_stop`] was called.
    StopRequested,
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
    /// The registry emptied during the run.
    Extinction,
    /// A tick failed and the run was aborted.
    TickFailed,
}

/// Stop flag and run limits shared with the tick loop.
#[derive(Debug)]
pub struct SchedulerControl {
    stop_requested: AtomicBool,
    tick_interval_ms: AtomicU64,
    started_at: DateTime<Utc>,
    max_ticks: u64,
    max_real_time_seconds: u64,
}

impl SchedulerControl {
    /// Create control state from the schedule configuration. The wall-clock
    /// limit is measured from this moment.
    pub fn new(schedule: &ScheduleConfig) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(schedule.tick_interval_ms),
            started_at: Utc::now(),
            max_ticks: schedule.max_ticks,
            max_real_time_seconds: schedule.max_real_time_seconds,
        }
    }

    /// Control with no limits and no pacing.
    pub fn unbounded() -> Self {
        Self::new(&ScheduleConfig::default())
    }

    /// Control that stops once `max_ticks` has been reached.
    pub fn with_max_ticks(max_ticks: u64) -> Self {
        Self::new(&ScheduleConfig {
            max_ticks,
            ..ScheduleConfig::default()
        })
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop after the current tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Pacing
    // -----------------------------------------------------------------------

    /// Current pause between ticks in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the pause between ticks. Returns the previous value.
    pub fn set_tick_interval_ms(&self, ms: u64) -> u64 {
        self.tick_interval_ms.swap(ms, Ordering::AcqRel)
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Whether `tick` has reached `max_ticks` (never, when the limit is 0).
    pub fn tick_limit_reached(&self, tick: &Scalar) -> bool {
        self.max_ticks > 0 && *tick >= Scalar::from(self.max_ticks)
    }

    /// Whether the wall-clock limit has elapsed (never, when the limit is 0).
    pub fn time_limit_reached(&self) -> bool {
        self.max_real_time_seconds > 0 && self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// Seconds elapsed since this control was created.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        // Negative if the wall clock stepped backwards.
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Configured tick limit (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Configured wall-clock limit in seconds (0 = unlimited).
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_running() {
        let control = SchedulerControl::unbounded();
        assert!(!control.is_stop_requested());
        assert_eq!(control.tick_interval_ms(), 0);
    }

    #[test]
    fn stop_request() {
        let control = SchedulerControl::unbounded();
        control.request_stop();
        assert!(control.is_stop_requested());
    }

    #[test]
    fn set_tick_interval_returns_previous() {
        let control = SchedulerControl::unbounded();
        assert_eq!(control.set_tick_interval_ms(250), 0);
        assert_eq!(control.tick_interval_ms(), 250);
    }

    #[test]
    fn tick_limit_zero_means_unlimited() {
        let control = SchedulerControl::unbounded();
        assert!(!control.tick_limit_reached(&Scalar::from(u64::MAX)));
    }

    #[test]
    fn tick_limit_reached() {
        let control = SchedulerControl::with_max_ticks(100);
        assert!(!control.tick_limit_reached(&Scalar::from(99_u32)));
        assert!(control.tick_limit_reached(&Scalar::from(100_u32)));
        assert!(control.tick_limit_reached(&Scalar::from(101_u32)));
    }

    #[test]
    fn time_limit_zero_means_unlimited() {
        let control = SchedulerControl::unbounded();
        assert!(!control.time_limit_reached());
    }

    #[test]
    fn stop_reason_serializes_snake_case() {
        let json = serde_json::to_string(&StopReason::MaxTicksReached).ok();
        assert_eq!(json.as_deref(), Some("\"max_ticks_reached\""));
    }
}
