//! Persistence consumer: encodes each sampled snapshot and hands the bytes
//! to a [`SnapshotStorage`] backend.

use causet_pipeline::{SinkError, SnapshotDelta, SnapshotSink};
use causet_types::Snapshot;
use tracing::trace;

use crate::codec;
use crate::error::CodecError;
use crate::snapshot_store::SnapshotStorage;

/// [`SnapshotSink`] that writes every snapshot it receives in the `TKSN`
/// format.
///
/// The full snapshot is always written; the delta is only used for
/// tracing.
#[derive(Debug)]
pub struct PersistSink<S> {
    storage: S,
    written_bytes: u64,
}

impl<S: SnapshotStorage> PersistSink<S> {
    /// Wrap a storage backend.
    pub const fn new(storage: S) -> Self {
        Self {
            storage,
            written_bytes: 0,
        }
    }

    /// The wrapped backend.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Total bytes handed to the backend so far.
    pub const fn written_bytes(&self) -> u64 {
        self.written_bytes
    }

    /// Unwrap the backend.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

impl<S: SnapshotStorage> SnapshotSink for PersistSink<S> {
    fn name(&self) -> &str {
        "persist"
    }

    fn consume(&mut self, snapshot: &Snapshot, delta: &SnapshotDelta) -> Result<(), SinkError> {
        let bytes = codec::encode(snapshot).map_err(|e| SinkError::new("encode", e))?;
        let tick = snapshot.tick.to_u64().ok_or_else(|| {
            SinkError::new(
                "encode",
                CodecError::ValueOutOfRange {
                    field: "tick",
                    value: snapshot.tick.to_string(),
                },
            )
        })?;
        self.storage
            .persist(tick, &bytes)
            .map_err(|e| SinkError::new("persist", e))?;
        self.written_bytes = self
            .written_bytes
            .saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        trace!(
            tick,
            bytes = bytes.len(),
            added = delta.added.len(),
            removed = delta.removed.len(),
            "snapshot encoded"
        );
        Ok(())
    }
}
