//! Error types for the snapshot pipeline.

/// Errors raised by [`SnapshotBuffer`](crate::buffer::SnapshotBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// A buffer must hold at least one entry.
    #[error("snapshot buffer capacity must be at least 1")]
    ZeroCapacity,

    /// The buffer was closed; no further pushes are accepted.
    #[error("snapshot buffer is closed")]
    Closed,

    /// A thread panicked while holding the buffer lock.
    #[error("snapshot buffer lock poisoned")]
    Poisoned,
}

/// A consumer sink failed to handle one snapshot.
///
/// Sinks live in downstream crates, so the failure is carried as a boxed
/// source tagged with the stage that failed.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct SinkError {
    /// Which step of the sink failed (e.g. `"encode"`, `"persist"`).
    pub stage: &'static str,
    /// The underlying error.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl SinkError {
    /// Tag an error with the sink stage that produced it.
    pub fn new(stage: &'static str, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}
