//! Delivery of serialised frames to connected viewers.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::error::TransportError;

/// Capacity of the viewer broadcast channel.
///
/// A viewer more than this many frames behind skips ahead to the newest
/// frame.
pub const BROADCAST_CAPACITY: usize = 64;

/// Accepts serialised packets and delivers them to zero or more viewers.
pub trait Transport: Send + Sync {
    /// Hand off one frame. Returns how many viewers it reached; zero
    /// viewers is success.
    fn send(&self, frame: &str) -> Result<usize, TransportError>;
}

/// Fan-out over a [`tokio::sync::broadcast`] channel.
///
/// Each connected socket holds its own receiver. Sending never blocks.
/// Closing drops the sender, so every receiver sees
/// [`RecvError::Closed`](broadcast::error::RecvError::Closed) once it has
/// read what was already queued.
#[derive(Debug)]
pub struct BroadcastTransport {
    tx: RwLock<Option<broadcast::Sender<Arc<str>>>>,
}

impl BroadcastTransport {
    /// Create a transport with the given per-viewer backlog.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx: RwLock::new(Some(tx)),
        }
    }

    /// Receiver for one viewer. After [`close`](Self::close) the receiver
    /// is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        if let Some(tx) = self.tx.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return tx.subscribe();
        }
        let (_, rx) = broadcast::channel(1);
        rx
    }

    /// Viewers currently subscribed.
    pub fn viewer_count(&self) -> usize {
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Refuse further frames and disconnect every viewer.
    pub fn close(&self) {
        self.tx.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.tx.read().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new(BROADCAST_CAPACITY)
    }
}

impl Transport for BroadcastTransport {
    fn send(&self, frame: &str) -> Result<usize, TransportError> {
        let guard = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        // Err only means nobody is listening.
        Ok(tx.send(Arc::from(frame)).unwrap_or(0))
    }
}
