//! Engine binary for the causet substrate.
//!
//! Wires the tick scheduler, the snapshot pipeline, the persistence and
//! stream consumers, and the stream server together, then runs until a
//! limit is reached, the population goes extinct, or `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (first argument, else `causet-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Seed the tick-0 substrate
//! 4. Start the persistence consumer (if enabled)
//! 5. Start the stream server and stream consumer (if enabled), and
//!    report every consumer's lag through the server
//! 6. Run the scheduler on the producer thread
//! 7. Close the lanes, join consumers, stop the server

mod consumers;
mod error;
mod seeding;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use causet_core::config::{LoggingConfig, SimulationConfig};
use causet_core::runner::log_run_end;
use causet_core::{RunResult, Scheduler, SchedulerControl, SchedulerError, TickRules};
use causet_pipeline::{SamplingCallback, ShutdownMode, SnapshotBuffer};
use causet_store::{FileSnapshotStore, PersistSink};
use causet_stream::{AppState, BrickQuantizer, ServerConfig, StreamSink, spawn_stream_server};
use causet_types::RunId;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::consumers::{ConsumerHandle, join_thread, spawn_consumer, spawn_lag_logger};
use crate::error::EngineError;

/// Config file read when no path is given.
const DEFAULT_CONFIG_PATH: &str = "causet-config.yaml";

/// How often consumer lag is logged.
const LAG_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Application entry point.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    let run_id = RunId::new();
    info!(%run_id, "causet-engine starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }

    // 3. Seed the substrate.
    let substrate = seeding::seed_substrate(&config)?;

    let control = Arc::new(SchedulerControl::new(&config.schedule));
    let poll_interval = Duration::from_millis(config.pipeline.poll_interval_ms);
    let mode = ShutdownMode::from_drain_flag(config.pipeline.drain_on_shutdown);
    let mut lanes: Vec<Arc<SnapshotBuffer>> = Vec::new();
    let mut consumers: Vec<ConsumerHandle> = Vec::new();

    // 4. Persistence consumer.
    if config.storage.enabled {
        let store = FileSnapshotStore::open(&config.storage.dir)?;
        info!(dir = %store.dir().display(), "Snapshot store opened");
        let lane = new_lane(&config)?;
        consumers.push(spawn_consumer(
            "persist",
            Arc::clone(&lane),
            Box::new(PersistSink::new(store)),
            poll_interval,
            mode,
        )?);
        lanes.push(lane);
    }

    // 5. Stream server and consumer.
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut stream_server = None;
    if config.stream.enabled {
        let quantizer = BrickQuantizer::from_config(&config.stream)?;
        let state = Arc::new(AppState::new(run_id));
        let server_config = ServerConfig::from_stream_config(&config.stream);
        let (handle, addr) = spawn_stream_server(&server_config, Arc::clone(&state), async move {
            shutdown_rx.await.ok();
        })
        .await?;
        info!(%addr, brick_size = quantizer.brick_size(), horizon = quantizer.horizon(), "Stream server started");

        let lane = new_lane(&config)?;
        consumers.push(spawn_consumer(
            "stream",
            Arc::clone(&lane),
            Box::new(StreamSink::new(quantizer, Arc::clone(&state))),
            poll_interval,
            mode,
        )?);
        lanes.push(lane);
        for consumer in &consumers {
            state.register_consumer(consumer.name(), Arc::clone(consumer.control().gauge()));
        }
        stream_server = Some((handle, state));
    }

    if lanes.is_empty() {
        info!("No consumers enabled; snapshots will not be sampled");
    }
    let lag_logger = spawn_lag_logger(&consumers, LAG_LOG_INTERVAL);

    // Ctrl-C stops the scheduler between ticks; under abandon mode the
    // consumers stop too instead of draining.
    {
        let control = Arc::clone(&control);
        let consumer_controls: Vec<_> = consumers.iter().map(|c| Arc::clone(c.control())).collect();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping scheduler");
                control.request_stop();
                if mode == ShutdownMode::Abandon {
                    for c in &consumer_controls {
                        c.request_stop();
                    }
                }
            }
        });
    }

    // 6. Run the scheduler on the producer thread.
    let rules = TickRules::from_config(&config);
    let sample_interval = config.pipeline.sample_interval;
    let producer = thread::Builder::new()
        .name(String::from("causet-producer"))
        .spawn({
            let control = Arc::clone(&control);
            move || -> Result<RunResult, SchedulerError> {
                let mut sampler = SamplingCallback::new(sample_interval, lanes);
                let mut scheduler = Scheduler::new(substrate, rules, control);
                let result = scheduler.run(&mut sampler);
                sampler.close_lanes();
                info!(
                    sampled = sampler.sampled(),
                    failed = sampler.failed(),
                    "Sampling finished"
                );
                result
            }
        })
        .map_err(|e| EngineError::Thread {
            name: String::from("producer"),
            message: e.to_string(),
        })?;
    let outcome = join_thread("producer", producer).await?;

    // 7. Drain consumers and stop the server.
    for consumer in consumers {
        consumer.join().await?;
    }
    lag_logger.abort();
    if let Some((handle, state)) = stream_server {
        state.transport.close();
        shutdown_tx.send(()).ok();
        handle.await.context("stream server task")?;
    }

    let result = outcome.map_err(EngineError::from)?;
    log_run_end(&result);
    info!(
        %run_id,
        stop_reason = ?result.stop_reason,
        total_ticks = result.total_ticks,
        "causet-engine shutdown complete"
    );
    Ok(())
}

/// Load configuration from `path`, or defaults if it does not exist.
///
/// Returns whether a file was read.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        Ok((SimulationConfig::parse("")?, false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the config level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn new_lane(config: &SimulationConfig) -> Result<Arc<SnapshotBuffer>, EngineError> {
    Ok(Arc::new(SnapshotBuffer::new(
        config.pipeline.buffer_capacity,
        config.pipeline.overflow_policy,
    )?))
}
