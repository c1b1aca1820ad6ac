//! Consumer threads and joining std threads from async code.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use causet_pipeline::{
    ConsumerControl, ConsumerReport, LagGauge, ShutdownMode, SnapshotBuffer, SnapshotSink, run_consumer,
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::EngineError;

/// A running consumer thread.
pub struct ConsumerHandle {
    name: &'static str,
    control: Arc<ConsumerControl>,
    thread: thread::JoinHandle<ConsumerReport>,
}

/// Start `sink` on its own thread, draining `lane`.
pub fn spawn_consumer(
    name: &'static str,
    lane: Arc<SnapshotBuffer>,
    mut sink: Box<dyn SnapshotSink>,
    poll_interval: Duration,
    mode: ShutdownMode,
) -> Result<ConsumerHandle, EngineError> {
    let control = Arc::new(ConsumerControl::new(poll_interval));
    let thread = thread::Builder::new()
        .name(format!("causet-{name}"))
        .spawn({
            let control = Arc::clone(&control);
            move || run_consumer(&lane, sink.as_mut(), &control, mode)
        })
        .map_err(|e| EngineError::Thread {
            name: name.to_owned(),
            message: e.to_string(),
        })?;
    info!(consumer = name, ?mode, "Consumer started");
    Ok(ConsumerHandle {
        name,
        control,
        thread,
    })
}

impl ConsumerHandle {
    /// The consumer's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The consumer's stop handle.
    pub const fn control(&self) -> &Arc<ConsumerControl> {
        &self.control
    }

    /// Wait for the thread and log its report.
    pub async fn join(self) -> Result<ConsumerReport, EngineError> {
        let report = join_thread(self.name, self.thread).await?;
        info!(
            consumer = self.name,
            exit = ?report.exit,
            consumed = report.consumed,
            failures = report.failures,
            abandoned = report.abandoned,
            last_tick = report.last_tick.as_ref().map(ToString::to_string),
            "Consumer finished"
        );
        Ok(report)
    }
}

/// Log every consumer's lag each `every` until the task is aborted.
pub fn spawn_lag_logger(consumers: &[ConsumerHandle], every: Duration) -> JoinHandle<()> {
    let gauges: Vec<(&'static str, Arc<LagGauge>)> = consumers
        .iter()
        .map(|c| (c.name, Arc::clone(c.control.gauge())))
        .collect();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick fires immediately; nothing has lagged yet.
        interval.tick().await;
        loop {
            interval.tick().await;
            for (name, gauge) in &gauges {
                let lag = gauge.read();
                info!(
                    consumer = *name,
                    lag_entries = lag.lag_entries,
                    lag_ticks = lag.lag_ticks,
                    consumed = lag.consumed,
                    failures = lag.failures,
                    "Consumer lag"
                );
            }
        }
    })
}

/// Join a std thread without blocking the async runtime.
pub async fn join_thread<T: Send + 'static>(
    name: &str,
    handle: thread::JoinHandle<T>,
) -> Result<T, EngineError> {
    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_panic)) => Err(EngineError::Thread {
            name: name.to_owned(),
            message: String::from("panicked"),
        }),
        Err(e) => Err(EngineError::Thread {
            name: name.to_owned(),
            message: e.to_string(),
        }),
    }
}
