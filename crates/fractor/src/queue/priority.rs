//! Blocking priority queue with optional aging promotion

use super::{QueueError, QueueResult};
use crate::work::{Priority, PriorityWork};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Aging configuration for a priority queue.
///
/// An item is promoted one level for each elapsed `threshold`, bounded at
/// `Priority::Critical`.
#[derive(Debug, Clone)]
pub struct AgingConfig {
    /// Elapsed time per promotion level
    pub threshold: Duration,
}

impl AgingConfig {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }
}

struct Entry {
    item: PriorityWork,
    seq: u64,
}

/// Thread-safe blocking queue ordered by `(priority, created_at)`.
///
/// Higher priority (lower numeric value) always precedes lower; within a
/// level items pop FIFO by creation time. With aging enabled, the
/// effective priority is recomputed on every read so long-waiting items
/// climb toward `Critical`.
pub struct PriorityWorkQueue {
    items: Mutex<Vec<Entry>>,
    notify: Notify,
    closed: Mutex<bool>,
    seq: AtomicU64,
    aging: Option<AgingConfig>,
}

impl PriorityWorkQueue {
    /// Create a queue without aging
    pub fn new() -> Self {
        Self::with_aging(None)
    }

    /// Create a queue with the given aging configuration
    pub fn with_aging(aging: Option<AgingConfig>) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            notify: Notify::new(),
            closed: Mutex::new(false),
            seq: AtomicU64::new(0),
            aging,
        }
    }

    /// Append an item. Fails once the queue is closed.
    pub fn push(&self, item: PriorityWork) -> QueueResult<()> {
        {
            let closed = self.closed.lock().unwrap();
            if *closed {
                return Err(QueueError::Closed);
            }
            let mut items = self.items.lock().unwrap();
            items.push(Entry {
                item,
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Pop the highest-priority item, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed and drained (end of
    /// stream).
    pub async fn pop(&self) -> Option<PriorityWork> {
        loop {
            let notified = self.notify.notified();

            if let Some(item) = self.pop_non_blocking() {
                return Some(item);
            }
            if *self.closed.lock().unwrap() {
                return None;
            }

            notified.await;
        }
    }

    /// Pop the highest-priority item without waiting
    pub fn pop_non_blocking(&self) -> Option<PriorityWork> {
        let mut items = self.items.lock().unwrap();
        if items.is_empty() {
            return None;
        }

        let now = Utc::now();
        let threshold = self.aging.as_ref().map(|a| a.threshold);

        let best = items
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| {
                (
                    e.item.effective_priority(now, threshold).value(),
                    e.item.created_at(),
                    e.seq,
                )
            })
            .map(|(i, _)| i)?;

        Some(items.swap_remove(best).item)
    }

    /// Close the queue: further pushes fail and blocked waiters wake with
    /// end-of-stream once drained. Idempotent.
    pub fn close(&self) {
        {
            let mut closed = self.closed.lock().unwrap();
            *closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    /// Remove all pending items, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock().unwrap();
        let n = items.len();
        items.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Per-priority depth counts (by declared priority)
    pub fn stats(&self) -> PriorityQueueStats {
        let items = self.items.lock().unwrap();
        let mut depth_by_priority = HashMap::new();
        for entry in items.iter() {
            *depth_by_priority.entry(entry.item.priority()).or_insert(0) += 1;
        }
        PriorityQueueStats {
            total_pending: items.len(),
            depth_by_priority,
            closed: *self.closed.lock().unwrap(),
        }
    }
}

impl Default for PriorityWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Priority queue statistics
#[derive(Debug, Clone)]
pub struct PriorityQueueStats {
    /// Total pending items
    pub total_pending: usize,

    /// Pending items by declared priority
    pub depth_by_priority: HashMap<Priority, usize>,

    /// Whether the queue has been closed
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_order() {
        let queue = PriorityWorkQueue::new();
        queue
            .push(PriorityWork::new(json!("low"), Priority::Low))
            .unwrap();
        queue
            .push(PriorityWork::new(json!("critical"), Priority::Critical))
            .unwrap();
        queue
            .push(PriorityWork::new(json!("normal"), Priority::Normal))
            .unwrap();

        assert_eq!(
            queue.pop_non_blocking().unwrap().work().input(),
            &json!("critical")
        );
        assert_eq!(
            queue.pop_non_blocking().unwrap().work().input(),
            &json!("normal")
        );
        assert_eq!(
            queue.pop_non_blocking().unwrap().work().input(),
            &json!("low")
        );
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = PriorityWorkQueue::new();
        for i in 0..5 {
            queue
                .push(PriorityWork::new(json!(i), Priority::Normal))
                .unwrap();
        }

        for i in 0..5 {
            assert_eq!(queue.pop_non_blocking().unwrap().work().input(), &json!(i));
        }
    }

    #[test]
    fn test_push_after_close_fails() {
        let queue = PriorityWorkQueue::new();
        queue.close();
        let err = queue
            .push(PriorityWork::new(json!(1), Priority::Normal))
            .unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }

    #[tokio::test]
    async fn test_blocking_pop_wakes_on_push() {
        use std::sync::Arc;

        let queue = Arc::new(PriorityWorkQueue::new());
        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue
            .push(PriorityWork::new(json!("hi"), Priority::High))
            .unwrap();

        let item = popper.await.unwrap().unwrap();
        assert_eq!(item.work().input(), &json!("hi"));
    }

    #[tokio::test]
    async fn test_close_wakes_waiters_with_end_of_stream() {
        use std::sync::Arc;

        let queue = Arc::new(PriorityWorkQueue::new());
        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        assert!(popper.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_drains_before_end_of_stream() {
        let queue = PriorityWorkQueue::new();
        queue
            .push(PriorityWork::new(json!(1), Priority::Normal))
            .unwrap();
        queue.close();

        // Pending item is still delivered, then end of stream
        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());
    }

    #[test]
    fn test_aging_promotes_old_items() {
        let queue =
            PriorityWorkQueue::with_aging(Some(AgingConfig::new(Duration::from_secs(10))));

        // A fresh high-priority item and a background item old enough to be
        // promoted past it
        let mut old = PriorityWork::new(json!("old"), Priority::Background);
        // 45s old with a 10s threshold: 4 levels, background -> critical
        set_created_at(&mut old, 45);
        queue.push(old).unwrap();
        queue
            .push(PriorityWork::new(json!("fresh"), Priority::High))
            .unwrap();

        assert_eq!(
            queue.pop_non_blocking().unwrap().work().input(),
            &json!("old")
        );
    }

    #[test]
    fn test_stats() {
        let queue = PriorityWorkQueue::new();
        queue
            .push(PriorityWork::new(json!(1), Priority::High))
            .unwrap();
        queue
            .push(PriorityWork::new(json!(2), Priority::High))
            .unwrap();
        queue
            .push(PriorityWork::new(json!(3), Priority::Low))
            .unwrap();

        let stats = queue.stats();
        assert_eq!(stats.total_pending, 3);
        assert_eq!(stats.depth_by_priority.get(&Priority::High), Some(&2));
        assert_eq!(stats.depth_by_priority.get(&Priority::Low), Some(&1));
        assert!(!stats.closed);
    }

    // Rewind an item's creation time for aging tests
    fn set_created_at(item: &mut PriorityWork, seconds_ago: i64) {
        let rewound = PriorityWork::from_work(item.work().clone(), item.priority());
        *item = rewound;
        // Serialize round-trip to rewrite the private timestamp
        let mut value = serde_json::to_value(&*item).unwrap();
        value["created_at"] = serde_json::to_value(
            Utc::now() - chrono::Duration::seconds(seconds_ago),
        )
        .unwrap();
        *item = serde_json::from_value(value).unwrap();
    }
}
