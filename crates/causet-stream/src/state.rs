//! Shared state for the stream server and the stream consumer.
//!
//! The consumer thread and the async socket handlers meet here: the
//! consumer reads the [`Camera`] and publishes frames through the
//! [`BroadcastTransport`]; sockets subscribe to the transport and write
//! camera updates back. Counters are atomics so neither side blocks the
//! other. Consumer lag gauges are registered here by name so the status
//! endpoint can report how far each lane trails the scheduler.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use causet_pipeline::{LagGauge, LagReading};
use causet_types::RunId;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::camera::Camera;
use crate::transport::BroadcastTransport;

/// Stream counters, updated by the consumer and the socket handlers.
#[derive(Debug, Default)]
pub struct StreamStats {
    packets_sent: AtomicU64,
    bricks_sent: AtomicU64,
    failures: AtomicU64,
    rejected_messages: AtomicU64,
    last_tick: AtomicU64,
    has_tick: AtomicBool,
    last_viewers: AtomicUsize,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReading {
    /// Packets handed to the transport.
    pub packets_sent: u64,
    /// Bricks across all sent packets.
    pub bricks_sent: u64,
    /// Snapshots that could not be streamed.
    pub failures: u64,
    /// Viewer messages ignored as malformed.
    pub rejected_messages: u64,
    /// Tick of the last sent packet.
    pub last_tick: Option<u64>,
    /// Viewers reached by the last packet.
    pub last_viewers: usize,
}

impl StreamStats {
    /// Record one packet handed off.
    pub fn record_packet(&self, tick: u64, bricks: usize, viewers: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bricks_sent
            .fetch_add(u64::try_from(bricks).unwrap_or(u64::MAX), Ordering::Relaxed);
        self.last_tick.store(tick, Ordering::Relaxed);
        self.has_tick.store(true, Ordering::Release);
        self.last_viewers.store(viewers, Ordering::Relaxed);
    }

    /// Record a snapshot that failed to stream.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed viewer message.
    pub fn record_rejected_message(&self) {
        self.rejected_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    pub fn read(&self) -> StatsReading {
        StatsReading {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bricks_sent: self.bricks_sent.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejected_messages: self.rejected_messages.load(Ordering::Relaxed),
            last_tick: self
                .has_tick
                .load(Ordering::Acquire)
                .then(|| self.last_tick.load(Ordering::Relaxed)),
            last_viewers: self.last_viewers.load(Ordering::Relaxed),
        }
    }
}

/// Shared state for the Axum application and the stream consumer.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// Run being streamed.
    pub run_id: RunId,
    /// When the server state was created.
    pub started_at: DateTime<Utc>,
    /// Frame fan-out to connected sockets.
    pub transport: Arc<BroadcastTransport>,
    /// Counters.
    pub stats: Arc<StreamStats>,
    camera: RwLock<Camera>,
    consumers: RwLock<BTreeMap<String, Arc<LagGauge>>>,
}

impl AppState {
    /// Fresh state for `run_id` with the default camera.
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            transport: Arc::new(BroadcastTransport::default()),
            stats: Arc::new(StreamStats::default()),
            camera: RwLock::new(Camera::default()),
            consumers: RwLock::new(BTreeMap::new()),
        }
    }

    /// The current camera.
    pub fn camera(&self) -> Camera {
        *self.camera.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the camera.
    pub fn set_camera(&self, camera: Camera) {
        *self.camera.write().unwrap_or_else(PoisonError::into_inner) = camera;
    }

    /// Report `gauge` under `name`, replacing any gauge already there.
    pub fn register_consumer(&self, name: impl Into<String>, gauge: Arc<LagGauge>) {
        self.consumers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), gauge);
    }

    /// Current lag of every registered consumer, by name.
    pub fn consumer_lag(&self) -> BTreeMap<String, LagReading> {
        self.consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, gauge)| (name.clone(), gauge.read()))
            .collect()
    }

    /// Sockets currently subscribed.
    pub fn viewer_count(&self) -> usize {
        self.transport.viewer_count()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RunId::new())
    }
}
