//! Unbounded, ordered, cancellable queue with a single logical consumer.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::core::cancel::{CancellationScope, Signal, WaitOutcome};
use crate::core::lock_unpoisoned;

/// FIFO queue whose consumer blocks through [`CancellationScope::wait_one`].
///
/// `available` mirrors "items is non-empty" and is only updated while the items lock is held.
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Signal,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Signal::manual_reset(false),
        }
    }

    /// Appends to the tail. Never blocks.
    pub fn enqueue(&self, item: T) {
        let mut items = lock_unpoisoned(&self.items);
        items.push_back(item);
        self.available.set();
    }

    /// Blocks until an item is available or `scope` is cancelled.
    ///
    /// Returns `None` on cancellation and leaves the queue untouched, even when items are
    /// waiting.
    pub fn try_dequeue(&self, scope: &CancellationScope) -> Option<T> {
        loop {
            if scope.is_cancelled() {
                return None;
            }
            {
                let mut items = lock_unpoisoned(&self.items);
                if let Some(item) = items.pop_front() {
                    if items.is_empty() {
                        self.available.reset();
                    }
                    return Some(item);
                }
            }
            if scope.wait_one(&self.available) == WaitOutcome::Cancelled {
                return None;
            }
        }
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.items).is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
