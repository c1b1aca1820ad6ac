//! Snapshot sampling on the producer thread.
//!
//! [`SamplingCallback`] is the scheduler's per-tick hook. Every
//! `sample_interval` ticks it assembles one immutable [`Snapshot`] and fans
//! the same `Arc` out to every consumer lane. Lanes are drop-oldest by
//! default, so sampling never stalls the tick loop.
//!
//! A snapshot that cannot be assembled means an entity invariant is broken;
//! the error goes back to the scheduler, which stops the run.

use std::sync::Arc;

use causet_core::{Substrate, TickCallback, TickError, TickSummary};
use causet_types::{Scalar, Snapshot};
use tracing::{debug, warn};

use crate::buffer::{PushOutcome, SnapshotBuffer};

/// Tick callback that samples snapshots into consumer lanes.
#[derive(Debug)]
pub struct SamplingCallback {
    interval: Scalar,
    lanes: Vec<Arc<SnapshotBuffer>>,
    sampled: u64,
    failed: u64,
}

impl SamplingCallback {
    /// Sample every `interval` ticks into `lanes`. An interval of 0 is
    /// treated as 1.
    pub fn new(interval: u64, lanes: Vec<Arc<SnapshotBuffer>>) -> Self {
        Self {
            interval: Scalar::from(interval.max(1)),
            lanes,
            sampled: 0,
            failed: 0,
        }
    }

    /// Snapshots assembled so far.
    pub const fn sampled(&self) -> u64 {
        self.sampled
    }

    /// Snapshots that could not be assembled.
    pub const fn failed(&self) -> u64 {
        self.failed
    }

    /// Close every lane so consumers can finish.
    pub fn close_lanes(&self) {
        for lane in &self.lanes {
            lane.close();
        }
    }

    fn publish(&self, snapshot: &Arc<Snapshot>) {
        for (lane_index, lane) in self.lanes.iter().enumerate() {
            match lane.push(Arc::clone(snapshot)) {
                Ok(PushOutcome::Accepted) => {}
                Ok(PushOutcome::DroppedOldest) => {
                    debug!(lane = lane_index, tick = %snapshot.tick, "lane full, dropped oldest snapshot");
                }
                Err(e) => {
                    warn!(lane = lane_index, tick = %snapshot.tick, error = %e, "snapshot push failed");
                }
            }
        }
    }
}

impl TickCallback for SamplingCallback {
    fn on_tick(&mut self, summary: &TickSummary, substrate: &Substrate) -> Result<(), TickError> {
        if !summary.tick.is_multiple_of(&self.interval) {
            return Ok(());
        }
        let snapshot = substrate.snapshot().map_err(|source| {
            self.failed = self.failed.saturating_add(1);
            TickError::Observe { source }
        })?;
        self.sampled = self.sampled.saturating_add(1);
        debug!(
            tick = %snapshot.tick,
            entities = snapshot.entity_count(),
            lanes = self.lanes.len(),
            "snapshot sampled"
        );
        self.publish(&Arc::new(snapshot));
        Ok(())
    }
}
