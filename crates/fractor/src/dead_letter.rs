//! Dead-letter queue for work that exhausted its retries

use crate::result::ErrorInfo;
use crate::work::Work;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::warn;

/// One exhausted failure: the work item, its final error, and free-form
/// context and metadata
#[derive(Debug, Clone)]
pub struct DlqEntry {
    pub work: Work,
    pub error: ErrorInfo,
    pub context: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl DlqEntry {
    pub fn new(work: Work, error: ErrorInfo) -> Self {
        Self {
            work,
            error,
            context: HashMap::new(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a context entry (workflow/job provenance)
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Time-ordered bounded queue of exhausted failures.
///
/// When full, the oldest entries are evicted first.
pub struct DeadLetterQueue {
    entries: Mutex<VecDeque<DlqEntry>>,
    max_size: Option<usize>,
}

impl DeadLetterQueue {
    /// Create a queue bounded at `max_size` entries
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_size: Some(max_size),
        }
    }

    /// Create an unbounded queue
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_size: None,
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn push(&self, entry: DlqEntry) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(max) = self.max_size {
            while entries.len() >= max {
                if let Some(evicted) = entries.pop_front() {
                    warn!(
                        "Dead-letter queue full; evicting oldest entry ({})",
                        evicted.error.message
                    );
                }
            }
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Snapshot of entries, oldest first
    pub fn entries(&self) -> Vec<DlqEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    /// Remove and return up to `n` oldest entries for reprocessing
    pub fn take_for_retry(&self, n: usize) -> Vec<DlqEntry> {
        let mut entries = self.entries.lock().unwrap();
        let take = n.min(entries.len());
        entries.drain(..take).collect()
    }

    /// Remove and return every entry's work item for resubmission
    pub fn retry_all(&self) -> Vec<Work> {
        let mut entries = self.entries.lock().unwrap();
        entries.drain(..).map(|e| e.work).collect()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(n: i64) -> DlqEntry {
        DlqEntry::new(Work::new(json!(n)), ErrorInfo::message(format!("err {}", n)))
    }

    #[test]
    fn test_time_order_preserved() {
        let dlq = DeadLetterQueue::unbounded();
        dlq.push(entry(1));
        dlq.push(entry(2));
        dlq.push(entry(3));

        let entries = dlq.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].timestamp <= entries[1].timestamp);
        assert!(entries[1].timestamp <= entries[2].timestamp);
        assert_eq!(entries[0].work.input(), &json!(1));
    }

    #[test]
    fn test_bounded_evicts_oldest() {
        let dlq = DeadLetterQueue::new(2);
        dlq.push(entry(1));
        dlq.push(entry(2));
        dlq.push(entry(3));

        assert_eq!(dlq.len(), 2);
        let entries = dlq.entries();
        assert_eq!(entries[0].work.input(), &json!(2));
        assert_eq!(entries[1].work.input(), &json!(3));
    }

    #[test]
    fn test_take_for_retry() {
        let dlq = DeadLetterQueue::unbounded();
        for n in 1..=5 {
            dlq.push(entry(n));
        }

        let taken = dlq.take_for_retry(2);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].work.input(), &json!(1));
        assert_eq!(dlq.len(), 3);

        let works = dlq.retry_all();
        assert_eq!(works.len(), 3);
        assert!(dlq.is_empty());
    }

    #[test]
    fn test_entry_context_and_metadata() {
        let e = entry(1)
            .with_context("workflow", "etl")
            .with_metadata("attempts", "3");
        assert_eq!(e.context.get("workflow").map(String::as_str), Some("etl"));
        assert_eq!(e.metadata.get("attempts").map(String::as_str), Some("3"));
    }
}
