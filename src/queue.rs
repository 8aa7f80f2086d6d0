//! Ordered specification queue shared by concurrent worker lifecycles.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::spec::SpecId;

/// Thread-safe FIFO queue of specification identifiers.
///
/// `try_pop` is the only way to take work out of the queue, and each
/// identifier is handed to exactly one caller: concurrent poppers never see
/// the same identifier twice and never lose one. There is no priority and no
/// re-ordering; identifiers come out in insertion order.
#[derive(Debug, Default)]
pub struct SpecQueue {
    inner: Mutex<VecDeque<SpecId>>,
}

impl SpecQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue pre-filled with the given identifiers, in order.
    pub fn from_specs(specs: impl IntoIterator<Item = SpecId>) -> Self {
        Self {
            inner: Mutex::new(specs.into_iter().collect()),
        }
    }

    /// Append an identifier to the back of the queue.
    pub fn enqueue(&self, spec: SpecId) {
        self.lock().push_back(spec);
    }

    /// Put an identifier back at the end of the queue.
    ///
    /// Used by the slot-timeout requeue policy; the identifier will be
    /// popped again by whichever lifecycle gets to it first.
    pub fn requeue(&self, spec: SpecId) {
        self.lock().push_back(spec);
    }

    /// Remove and return the next identifier, or `None` when empty.
    pub fn try_pop(&self) -> Option<SpecId> {
        self.lock().pop_front()
    }

    /// Remaining number of queued identifiers.
    ///
    /// Best-effort under concurrency: the value may be stale by the time the
    /// caller observes it, but it is never negative and never exceeds the
    /// number of identifiers enqueued so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SpecId>> {
        // A panic while holding the lock poisons it; the queue itself is
        // always in a consistent state, so recover the guard.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
