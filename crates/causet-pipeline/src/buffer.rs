//! Bounded FIFO hand-off between the tick loop and one consumer.
//!
//! A [`SnapshotBuffer`] is a mutex-guarded [`VecDeque`] with two condition
//! variables: `not_empty` wakes a waiting consumer on push, `not_full` wakes
//! a producer blocked under [`OverflowPolicy::Block`]. Under the default
//! [`OverflowPolicy::DropOldest`] the producer never waits: a push into a
//! full buffer evicts the oldest entry, so the buffer always holds the most
//! recent `capacity` snapshots.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use causet_core::config::OverflowPolicy;
use causet_types::{Scalar, Snapshot};

use crate::error::BufferError;

/// What happened to a pushed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Enqueued without evicting anything.
    Accepted,
    /// Enqueued after evicting the oldest entry.
    DroppedOldest,
}

/// Result of a timed pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopResult {
    /// The oldest queued snapshot.
    Item(Arc<Snapshot>),
    /// Nothing arrived before the timeout.
    TimedOut,
    /// The buffer is closed and empty.
    Closed,
}

/// Counters describing a buffer's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Snapshots accepted by `push`.
    pub pushed: u64,
    /// Snapshots evicted under drop-oldest.
    pub dropped: u64,
    /// Tick of the most recently pushed snapshot.
    pub latest_tick: Option<Scalar>,
    /// Entries currently queued.
    pub queued: usize,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<Arc<Snapshot>>,
    closed: bool,
    pushed: u64,
    dropped: u64,
    latest_tick: Option<Scalar>,
}

/// Bounded single-producer, single-consumer snapshot queue.
#[derive(Debug)]
pub struct SnapshotBuffer {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl SnapshotBuffer {
    /// Create a buffer holding at most `capacity` snapshots.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                ..Inner::default()
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, BufferError> {
        self.inner.lock().map_err(|_poisoned| BufferError::Poisoned)
    }

    /// Enqueue a snapshot, applying the overflow policy if full.
    ///
    /// Under [`OverflowPolicy::DropOldest`] this never waits on a consumer.
    pub fn push(&self, snapshot: Arc<Snapshot>) -> Result<PushOutcome, BufferError> {
        let mut inner = self.lock()?;
        if inner.closed {
            return Err(BufferError::Closed);
        }

        let mut outcome = PushOutcome::Accepted;
        if inner.queue.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    inner.queue.pop_front();
                    inner.dropped = inner.dropped.saturating_add(1);
                    outcome = PushOutcome::DroppedOldest;
                }
                OverflowPolicy::Block => {
                    while inner.queue.len() >= self.capacity && !inner.closed {
                        inner = self
                            .not_full
                            .wait(inner)
                            .map_err(|_poisoned| BufferError::Poisoned)?;
                    }
                    if inner.closed {
                        return Err(BufferError::Closed);
                    }
                }
            }
        }

        inner.latest_tick = Some(snapshot.tick.clone());
        inner.queue.push_back(snapshot);
        inner.pushed = inner.pushed.saturating_add(1);
        drop(inner);
        self.not_empty.notify_one();
        Ok(outcome)
    }

    /// Pop the oldest snapshot without waiting.
    pub fn try_pop(&self) -> Result<Option<Arc<Snapshot>>, BufferError> {
        let mut inner = self.lock()?;
        let item = inner.queue.pop_front();
        drop(inner);
        if item.is_some() {
            self.not_full.notify_one();
        }
        Ok(item)
    }

    /// Pop the oldest snapshot, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<PopResult, BufferError> {
        let inner = self.lock()?;
        let (mut inner, _timeout) = self
            .not_empty
            .wait_timeout_while(inner, timeout, |i| i.queue.is_empty() && !i.closed)
            .map_err(|_poisoned| BufferError::Poisoned)?;

        let result = match inner.queue.pop_front() {
            Some(item) => PopResult::Item(item),
            None if inner.closed => PopResult::Closed,
            None => PopResult::TimedOut,
        };
        drop(inner);
        if matches!(result, PopResult::Item(_)) {
            self.not_full.notify_one();
        }
        Ok(result)
    }

    /// Discard everything queued. Returns how many entries were dropped.
    pub fn clear(&self) -> Result<usize, BufferError> {
        let mut inner = self.lock()?;
        let count = inner.queue.len();
        inner.queue.clear();
        drop(inner);
        self.not_full.notify_all();
        Ok(count)
    }

    /// Close the buffer: further pushes fail, and every waiter wakes.
    /// Entries already queued can still be popped.
    pub fn close(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.closed = true;
        }
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().is_ok_and(|i| i.closed)
    }

    /// Entries currently queued.
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |i| i.queue.len())
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy.
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Push/drop counters and the latest pushed tick.
    pub fn stats(&self) -> Result<BufferStats, BufferError> {
        let inner = self.lock()?;
        Ok(BufferStats {
            pushed: inner.pushed,
            dropped: inner.dropped,
            latest_tick: inner.latest_tick.clone(),
            queued: inner.queue.len(),
        })
    }
}
