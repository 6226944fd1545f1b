//! Unbounded thread-safe FIFO work queue

use crate::work::Work;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Unbounded FIFO queue of work items.
///
/// Push and pop are atomic; the queue is safe to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<Work>>,
}

impl WorkQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Append one work item
    pub fn push(&self, work: Work) {
        self.items.lock().unwrap().push_back(work);
    }

    /// Append many work items in order
    pub fn push_all(&self, works: impl IntoIterator<Item = Work>) {
        let mut items = self.items.lock().unwrap();
        items.extend(works);
    }

    /// Pop the oldest item
    pub fn pop(&self) -> Option<Work> {
        self.items.lock().unwrap().pop_front()
    }

    /// Pop up to `n` items, oldest first
    pub fn pop_batch(&self, n: usize) -> Vec<Work> {
        let mut items = self.items.lock().unwrap();
        let take = n.min(items.len());
        items.drain(..take).collect()
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Remove all items, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock().unwrap();
        let n = items.len();
        items.clear();
        n
    }

    /// Snapshot of pending items for inspection
    pub fn snapshot(&self) -> Vec<Work> {
        self.items.lock().unwrap().iter().cloned().collect()
    }
}
