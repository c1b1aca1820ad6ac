//! Error types for the live stream.
//!
//! [`StreamError`] covers quantisation and the packet decode path;
//! [`TransportError`] is what a [`Transport`](crate::transport::Transport)
//! reports when a frame cannot be handed off.

/// Errors produced while building or decoding stream packets.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Quantiser parameters are unusable.
    #[error("invalid quantizer parameter {name}: {reason}")]
    InvalidParameter {
        /// Which parameter.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A packet or viewer message is structurally invalid.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// A value does not fit the packet's integer fields.
    #[error("{field} value {value} does not fit the stream packet")]
    OutOfRange {
        /// Which field.
        field: &'static str,
        /// The offending value, rendered.
        value: String,
    },

    /// JSON framing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Shorthand for [`StreamError::Malformed`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The transport was shut down.
    #[error("transport is closed")]
    Closed,
}
