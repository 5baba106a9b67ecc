//! Blocking FIFO shared between one producer and many workers.
//!
//! Every decision a consumer makes (is there an item, is the queue closed,
//! should I sleep) is taken while holding the same mutex the producer pushes
//! under, and every wake re-evaluates both conditions. A consumer therefore
//! cannot miss the close signal, and an item is handed to exactly one caller.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::PipelineError;

/// Result of a blocking pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// The queue is closed and drained; no item will ever arrive again.
    Closed,
}

impl<T> Pop<T> {
    #[inline]
    pub fn into_item(self) -> Option<T> {
        match self {
            Pop::Item(item) => Some(item),
            Pop::Closed => None,
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, Pop::Closed)
    }
}

/// Returned by [`WorkQueue::push`] once the queue is closed. Carries the
/// rejected item back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("push into closed queue")
    }
}

impl<T: fmt::Debug> std::error::Error for PushError<T> {}

impl<T> From<PushError<T>> for PipelineError {
    fn from(_: PushError<T>) -> Self {
        PipelineError::QueueClosed
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

#[repr(align(64))]
struct QueueStats {
    pushed: AtomicU64,
    popped: AtomicU64,
    waits: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    pub pushed: u64,
    pub popped: u64,
    /// Times a consumer found the queue empty and open and went to sleep.
    pub waits: u64,
}

pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
    stats: QueueStats,
}

impl<T> WorkQueue<T> {
    /// Unbounded queue; `push` never blocks.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Queue holding at most `capacity` items; `push` blocks while full.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let initial = capacity.unwrap_or(1024).min(64 * 1024);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(initial),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.map(|c| c.max(1)),
            stats: QueueStats {
                pushed: AtomicU64::new(0),
                popped: AtomicU64::new(0),
                waits: AtomicU64::new(0),
            },
        }
    }

    /// Appends `item` at the tail. On a bounded queue this waits for room.
    /// Fails only when the queue has been closed, returning the item.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.state.lock();
        if let Some(capacity) = self.capacity {
            while !state.closed && state.items.len() >= capacity {
                self.not_full.wait(&mut state);
            }
        }
        if state.closed {
            return Err(PushError(item));
        }
        state.items.push_back(item);
        drop(state);

        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.on_popped();
        }
        item
    }

    /// Removes the head item, sleeping until one arrives. Returns
    /// [`Pop::Closed`] once the queue is both closed and empty.
    pub fn blocking_pop(&self) -> Pop<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.on_popped();
                return Pop::Item(item);
            }
            if state.closed {
                return Pop::Closed;
            }
            self.stats.waits.fetch_add(1, Ordering::Relaxed);
            self.not_empty.wait(&mut state);
        }
    }

    /// Like [`blocking_pop`](Self::blocking_pop) but gives up after `timeout`,
    /// returning `None` if neither an item nor the close signal showed up.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Pop<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.on_popped();
                return Some(Pop::Item(item));
            }
            if state.closed {
                return Some(Pop::Closed);
            }
            if Instant::now() >= deadline {
                return None;
            }
            self.stats.waits.fetch_add(1, Ordering::Relaxed);
            let _ = self.not_empty.wait_until(&mut state, deadline);
        }
    }

    /// Marks the queue closed and wakes every sleeper. Idempotent; returns
    /// `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            pushed: self.stats.pushed.load(Ordering::Relaxed),
            popped: self.stats.popped.load(Ordering::Relaxed),
            waits: self.stats.waits.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn on_popped(&self) {
        self.stats.popped.fetch_add(1, Ordering::Relaxed);
        if self.capacity.is_some() {
            self.not_full.notify_one();
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes the queue when dropped, so a producer that returns early or
/// unwinds still releases every blocked consumer.
pub struct CloseGuard<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<'a, T> CloseGuard<'a, T> {
    pub fn new(queue: &'a WorkQueue<T>) -> Self {
        Self { queue }
    }
}

impl<T> Drop for CloseGuard<'_, T> {
    fn drop(&mut self) {
        self.queue.close();
    }
}
