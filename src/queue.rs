//! Bounded, blocking FIFO queue shared between the transport and the
//! dispatch thread pools.
//!
//! Mirrors the original `MessageQueue` (a fixed ring buffer guarded by a
//! mutex and two condition variables) but uses a `VecDeque` and is generic
//! over the element type, since both the incoming queue (raw message
//! strings) and any future typed queue can share one implementation.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Default capacity used by the server's incoming/outgoing queues.
pub const DEFAULT_CAPACITY: usize = 64;

/// Error returned by [`MessageQueue::dequeue`] when the queue was stopped
/// while the caller was blocked waiting for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStopped;

impl std::fmt::Display for QueueStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("message queue has been stopped")
    }
}

impl std::error::Error for QueueStopped {}

struct Inner<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    running: bool,
    /// When set by `stop_now`, `dequeue` drops whatever is buffered instead
    /// of draining it, so a caller blocked in `enqueue` is released and
    /// pending work is abandoned rather than delivered.
    drop_pending: bool,
}

/// A bounded FIFO of `T`, with a `stop`/`stop_now` lifecycle.
///
/// At most `capacity` elements are resident at a time; FIFO order is
/// preserved. A single mutex protects the buffer; two condvars
/// (`enqueued`, `dequeued`) avoid thundering-herd wakes on the respective
/// wait loops.
pub struct MessageQueue<T> {
    inner: Mutex<Inner<T>>,
    enqueued: Condvar,
    dequeued: Condvar,
}

impl<T> MessageQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: VecDeque::with_capacity(capacity),
                capacity,
                running: true,
                drop_pending: false,
            }),
            enqueued: Condvar::new(),
            dequeued: Condvar::new(),
        }
    }

    /// Push `message` onto the tail of the queue, blocking while full.
    ///
    /// Returns `false` if the queue was stopped before or while waiting;
    /// the message is not enqueued in that case.
    pub fn enqueue(&self, message: T) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while guard.buffer.len() == guard.capacity && guard.running {
            guard = self.dequeued.wait(guard).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        if guard.running && guard.buffer.len() < guard.capacity {
            guard.buffer.push_back(message);
            self.enqueued.notify_one();
            true
        } else {
            false
        }
    }

    /// Pop the head of the queue, blocking while empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueStopped`] if the queue was stopped before or while
    /// the caller was waiting for a message.
    pub fn dequeue(&self) -> Result<T, QueueStopped> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while guard.buffer.is_empty() && guard.running {
            guard = self.enqueued.wait(guard).unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        if !guard.running && (guard.drop_pending || guard.buffer.is_empty()) {
            return Err(QueueStopped);
        }
        match guard.buffer.pop_front() {
            Some(message) => {
                self.dequeued.notify_one();
                Ok(message)
            }
            None => Err(QueueStopped),
        }
    }

    /// Stop the queue, draining already-buffered messages to waiting
    /// dequeuers but refusing new enqueues. Idempotent.
    pub fn stop(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.running = false;
        drop(guard);
        self.enqueued.notify_all();
        self.dequeued.notify_all();
    }

    /// Stop the queue and discard anything still buffered; blocked
    /// dequeuers are released with [`QueueStopped`] rather than draining
    /// pending work. Idempotent.
    pub fn stop_now(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.running = false;
        guard.drop_pending = true;
        guard.buffer.clear();
        drop(guard);
        self.enqueued.notify_all();
        self.dequeued.notify_all();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).running
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
