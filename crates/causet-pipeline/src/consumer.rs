//! Consumer loop: pop, diff, hand to a sink, track lag.
//!
//! [`run_consumer`] runs on its own thread and only ever reads immutable
//! snapshots out of its lane. It holds no lock on the live substrate. Sink
//! failures are logged and counted but never end the loop; the loop ends on
//! a stop request (draining or abandoning what is queued, per
//! [`ShutdownMode`]) or when its lane is closed and empty.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use causet_types::{Scalar, Snapshot};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::buffer::{PopResult, SnapshotBuffer};
use crate::delta::SnapshotDelta;
use crate::error::SinkError;

/// Downstream handler for sampled snapshots (persist, stream, ...).
pub trait SnapshotSink: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Handle one snapshot and the backward delta from the previous one this
    /// consumer saw.
    fn consume(&mut self, snapshot: &Snapshot, delta: &SnapshotDelta) -> Result<(), SinkError>;
}

/// What a consumer does with queued entries when asked to stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Process everything still queued, then exit.
    #[default]
    Drain,
    /// Discard everything still queued and exit.
    Abandon,
}

impl ShutdownMode {
    /// Map the `drain_on_shutdown` config flag.
    pub const fn from_drain_flag(drain: bool) -> Self {
        if drain { Self::Drain } else { Self::Abandon }
    }
}

/// Lag and throughput readings for one consumer, readable from any thread.
#[derive(Debug, Default)]
pub struct LagGauge {
    lag_entries: AtomicUsize,
    lag_ticks: AtomicU64,
    consumed: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of a [`LagGauge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LagReading {
    /// Entries still queued in the lane.
    pub lag_entries: usize,
    /// Latest produced tick minus last consumed tick.
    pub lag_ticks: u64,
    /// Snapshots handed to the sink.
    pub consumed: u64,
    /// Sink failures.
    pub failures: u64,
}

impl LagGauge {
    /// Read every counter.
    pub fn read(&self) -> LagReading {
        LagReading {
            lag_entries: self.lag_entries.load(Ordering::Acquire),
            lag_ticks: self.lag_ticks.load(Ordering::Acquire),
            consumed: self.consumed.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
        }
    }

    fn update(&self, buffer: &SnapshotBuffer, last_consumed: Option<&Scalar>) {
        let (queued, latest) = buffer
            .stats()
            .map_or((0, None), |s| (s.queued, s.latest_tick));
        self.lag_entries.store(queued, Ordering::Release);
        let lag_ticks = match (latest, last_consumed) {
            (Some(latest), Some(last)) => (&latest - last).to_u64().unwrap_or(u64::MAX),
            // Nothing consumed yet: the whole produced range is lag.
            (Some(latest), None) => latest.to_u64().unwrap_or(u64::MAX),
            (None, _) => 0,
        };
        self.lag_ticks.store(lag_ticks, Ordering::Release);
    }
}

/// Stop flag, poll interval, and lag gauge shared with one consumer thread.
#[derive(Debug)]
pub struct ConsumerControl {
    stop_requested: AtomicBool,
    poll_interval: Duration,
    gauge: Arc<LagGauge>,
}

impl ConsumerControl {
    /// Create control state; the consumer wakes at least every
    /// `poll_interval` to notice a stop request.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            poll_interval,
            gauge: Arc::new(LagGauge::default()),
        }
    }

    /// Ask the consumer to stop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Poll interval.
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The consumer's lag gauge.
    pub const fn gauge(&self) -> &Arc<LagGauge> {
        &self.gauge
    }
}

/// Why a consumer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// A stop was requested.
    Stopped,
    /// The lane was closed and empty.
    Closed,
    /// The lane became unusable (poisoned lock).
    BufferFailed,
}

/// Final accounting of one consumer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Why the loop ended.
    pub exit: ConsumerExit,
    /// Snapshots handed to the sink (successfully or not).
    pub consumed: u64,
    /// Sink failures.
    pub failures: u64,
    /// Entries discarded under [`ShutdownMode::Abandon`].
    pub abandoned: usize,
    /// Tick of the last snapshot consumed.
    pub last_tick: Option<Scalar>,
}

struct ConsumerState<'a> {
    sink: &'a mut dyn SnapshotSink,
    gauge: &'a LagGauge,
    last: Option<Arc<Snapshot>>,
    consumed: u64,
    failures: u64,
}

impl ConsumerState<'_> {
    fn handle(&mut self, snapshot: Arc<Snapshot>) {
        let delta = SnapshotDelta::between(self.last.as_deref(), &snapshot);
        self.consumed = self.consumed.saturating_add(1);
        self.gauge.consumed.fetch_add(1, Ordering::AcqRel);

        match self.sink.consume(&snapshot, &delta) {
            Ok(()) => debug!(
                sink = self.sink.name(),
                tick = %snapshot.tick,
                added = delta.added.len(),
                removed = delta.removed.len(),
                "snapshot consumed"
            ),
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                self.gauge.failures.fetch_add(1, Ordering::AcqRel);
                warn!(sink = self.sink.name(), tick = %snapshot.tick, error = %e, "sink failed");
            }
        }
        self.last = Some(snapshot);
    }

    fn last_tick(&self) -> Option<&Scalar> {
        self.last.as_ref().map(|s| &s.tick)
    }
}

/// Run a consumer until stopped or until its lane closes.
pub fn run_consumer(
    buffer: &SnapshotBuffer,
    sink: &mut dyn SnapshotSink,
    control: &ConsumerControl,
    shutdown: ShutdownMode,
) -> ConsumerReport {
    let name = sink.name().to_owned();
    info!(sink = %name, capacity = buffer.capacity(), ?shutdown, "Consumer starting");

    let mut state = ConsumerState {
        sink,
        gauge: control.gauge(),
        last: None,
        consumed: 0,
        failures: 0,
    };
    let mut abandoned = 0_usize;

    let exit = loop {
        if control.is_stop_requested() {
            match shutdown {
                ShutdownMode::Drain => {
                    while let Ok(Some(snapshot)) = buffer.try_pop() {
                        state.handle(snapshot);
                    }
                }
                ShutdownMode::Abandon => {
                    abandoned = buffer.clear().unwrap_or(0);
                }
            }
            break ConsumerExit::Stopped;
        }

        match buffer.pop_timeout(control.poll_interval()) {
            Ok(PopResult::Item(snapshot)) => state.handle(snapshot),
            Ok(PopResult::TimedOut) => {}
            Ok(PopResult::Closed) => break ConsumerExit::Closed,
            Err(e) => {
                error!(sink = %name, error = %e, "Consumer lane unusable");
                break ConsumerExit::BufferFailed;
            }
        }
        state.gauge.update(buffer, state.last_tick());
    };
    state.gauge.update(buffer, state.last_tick());

    let report = ConsumerReport {
        exit,
        consumed: state.consumed,
        failures: state.failures,
        abandoned,
        last_tick: state.last_tick().cloned(),
    };
    info!(
        sink = %name,
        exit = ?report.exit,
        consumed = report.consumed,
        failures = report.failures,
        abandoned = report.abandoned,
        "Consumer stopped"
    );
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use causet_core::config::OverflowPolicy;

    use super::*;

    struct Recorder {
        seen: Arc<Mutex<Vec<(Option<Scalar>, Scalar)>>>,
        fail_on: Option<Scalar>,
    }

    impl SnapshotSink for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn consume(&mut self, snapshot: &Snapshot, delta: &SnapshotDelta) -> Result<(), SinkError> {
            self.seen
                .lock()
                .unwrap()
                .push((delta.from_tick.clone(), snapshot.tick.clone()));
            if self.fail_on.as_ref() == Some(&snapshot.tick) {
                return Err(SinkError::new("record", "injected failure"));
            }
            Ok(())
        }
    }

    fn snap(tick: u32) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(Scalar::from(tick), 1, Vec::new()))
    }

    fn recorder() -> (Recorder, Arc<Mutex<Vec<(Option<Scalar>, Scalar)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                seen: Arc::clone(&seen),
                fail_on: None,
            },
            seen,
        )
    }

    #[test]
    fn consumes_until_closed_with_backward_deltas() {
        let buf = SnapshotBuffer::new(8, OverflowPolicy::DropOldest).unwrap();
        for t in [10, 20, 40] {
            buf.push(snap(t)).unwrap();
        }
        buf.close();
        let (mut sink, seen) = recorder();
        let control = ConsumerControl::new(Duration::from_millis(5));

        let report = run_consumer(&buf, &mut sink, &control, ShutdownMode::Drain);

        assert_eq!(report.exit, ConsumerExit::Closed);
        assert_eq!(report.consumed, 3);
        assert_eq!(report.last_tick, Some(Scalar::from(40_u32)));
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (None, Scalar::from(10_u32)),
                (Some(Scalar::from(10_u32)), Scalar::from(20_u32)),
                (Some(Scalar::from(20_u32)), Scalar::from(40_u32)),
            ]
        );
        assert_eq!(control.gauge().read().lag_ticks, 0);
    }

    #[test]
    fn sink_failure_does_not_stop_the_loop() {
        let buf = SnapshotBuffer::new(8, OverflowPolicy::DropOldest).unwrap();
        for t in 1..=3 {
            buf.push(snap(t)).unwrap();
        }
        buf.close();
        let (mut sink, _seen) = recorder();
        sink.fail_on = Some(Scalar::from(2_u32));
        let control = ConsumerControl::new(Duration::from_millis(5));

        let report = run_consumer(&buf, &mut sink, &control, ShutdownMode::Drain);

        assert_eq!(report.consumed, 3);
        assert_eq!(report.failures, 1);
        assert_eq!(control.gauge().read().failures, 1);
    }

    #[test]
    fn stop_with_drain_processes_queue() {
        let buf = SnapshotBuffer::new(8, OverflowPolicy::DropOldest).unwrap();
        for t in 1..=5 {
            buf.push(snap(t)).unwrap();
        }
        let (mut sink, _seen) = recorder();
        let control = ConsumerControl::new(Duration::from_millis(5));
        control.request_stop();

        let report = run_consumer(&buf, &mut sink, &control, ShutdownMode::Drain);

        assert_eq!(report.exit, ConsumerExit::Stopped);
        assert_eq!(report.consumed, 5);
        assert_eq!(report.abandoned, 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn stop_with_abandon_discards_queue() {
        let buf = SnapshotBuffer::new(8, OverflowPolicy::DropOldest).unwrap();
        for t in 1..=5 {
            buf.push(snap(t)).unwrap();
        }
        let (mut sink, _seen) = recorder();
        let control = ConsumerControl::new(Duration::from_millis(5));
        control.request_stop();

        let report = run_consumer(&buf, &mut sink, &control, ShutdownMode::Abandon);

        assert_eq!(report.exit, ConsumerExit::Stopped);
        assert_eq!(report.consumed, 0);
        assert_eq!(report.abandoned, 5);
    }

    #[test]
    fn stop_request_ends_an_idle_consumer() {
        let buf = Arc::new(SnapshotBuffer::new(4, OverflowPolicy::DropOldest).unwrap());
        let control = Arc::new(ConsumerControl::new(Duration::from_millis(5)));
        let handle = {
            let buf = Arc::clone(&buf);
            let control = Arc::clone(&control);
            thread::spawn(move || {
                let (mut sink, _seen) = recorder();
                run_consumer(&buf, &mut sink, &control, ShutdownMode::Drain)
            })
        };
        thread::sleep(Duration::from_millis(20));
        control.request_stop();
        let report = handle.join().unwrap();
        assert_eq!(report.exit, ConsumerExit::Stopped);
    }

    #[test]
    fn gauge_reports_lag_behind_producer() {
        let buf = SnapshotBuffer::new(8, OverflowPolicy::DropOldest).unwrap();
        let gauge = LagGauge::default();
        buf.push(snap(100)).unwrap();
        buf.push(snap(200)).unwrap();
        buf.push(snap(300)).unwrap();
        let first = buf.try_pop().unwrap().unwrap();

        gauge.update(&buf, Some(&first.tick));

        let reading = gauge.read();
        assert_eq!(reading.lag_entries, 2);
        assert_eq!(reading.lag_ticks, 200);
    }

    #[test]
    fn shutdown_mode_from_flag() {
        assert_eq!(ShutdownMode::from_drain_flag(true), ShutdownMode::Drain);
        assert_eq!(ShutdownMode::from_drain_flag(false), ShutdownMode::Abandon);
    }
}
