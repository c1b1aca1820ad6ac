//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup, the producer
//! thread, and the consumers, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: causet_core::config::ConfigError,
    },

    /// The substrate rejected the seed population.
    #[error("substrate error: {source}")]
    Substrate {
        /// The underlying substrate error.
        #[from]
        source: causet_core::SubstrateError,
    },

    /// The scheduler stopped on a failed tick.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: causet_core::SchedulerError,
    },

    /// A snapshot buffer could not be created.
    #[error("buffer error: {source}")]
    Buffer {
        /// The underlying buffer error.
        #[from]
        source: causet_pipeline::BufferError,
    },

    /// The snapshot store could not be opened.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: causet_store::StoreError,
    },

    /// The stream quantizer rejected its parameters.
    #[error("stream error: {source}")]
    Stream {
        /// The underlying stream error.
        #[from]
        source: causet_stream::StreamError,
    },

    /// The stream server failed to start.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: causet_stream::ServerError,
    },

    /// Seed parameters are unusable.
    #[error("seeding error: {message}")]
    Seeding {
        /// Description of the problem.
        message: String,
    },

    /// A worker thread panicked or could not be spawned.
    #[error("{name} thread failed: {message}")]
    Thread {
        /// Which thread.
        name: String,
        /// Description of the failure.
        message: String,
    },
}
