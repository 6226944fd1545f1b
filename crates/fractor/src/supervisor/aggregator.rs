//! Append-only collection of work results

use crate::result::WorkResult;
use std::sync::Mutex;

/// Collects work results partitioned into successes and errors.
///
/// Results appear in the order their envelopes were received; the two
/// partitions are disjoint and together cover every completed work item.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Mutex<Vec<WorkResult>>,
    errors: Mutex<Vec<WorkResult>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result into the matching partition
    pub fn record(&self, result: WorkResult) {
        if result.is_success() {
            self.results.lock().unwrap().push(result);
        } else {
            self.errors.lock().unwrap().push(result);
        }
    }

    /// Number of successful results
    pub fn success_count(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    /// Number of error results
    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    /// Total recorded results
    pub fn total(&self) -> usize {
        self.success_count() + self.error_count()
    }

    /// Snapshot of successful results, in delivery order
    pub fn results(&self) -> Vec<WorkResult> {
        self.results.lock().unwrap().clone()
    }

    /// Snapshot of error results, in delivery order
    pub fn errors(&self) -> Vec<WorkResult> {
        self.errors.lock().unwrap().clone()
    }

    /// Drop all recorded results
    pub fn clear(&self) {
        self.results.lock().unwrap().clear();
        self.errors.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::WorkError;
    use crate::work::Work;
    use serde_json::json;

    #[test]
    fn test_partitioning() {
        let aggregator = ResultAggregator::new();

        aggregator.record(WorkResult::success(Work::new(json!(1)), json!(2)));
        aggregator.record(WorkResult::failure(
            Work::new(json!(5)),
            WorkError::Other("Cannot process 5".to_string()),
        ));
        aggregator.record(WorkResult::success(Work::new(json!(3)), json!(6)));

        assert_eq!(aggregator.success_count(), 2);
        assert_eq!(aggregator.error_count(), 1);
        assert_eq!(aggregator.total(), 3);

        // Partitions are disjoint and ordered by delivery
        let results = aggregator.results();
        assert!(results.iter().all(|r| r.is_success()));
        assert_eq!(results[0].result(), Some(&json!(2)));
        assert_eq!(results[1].result(), Some(&json!(6)));
        assert!(aggregator.errors().iter().all(|r| r.is_failure()));
    }

    #[test]
    fn test_clear() {
        let aggregator = ResultAggregator::new();
        aggregator.record(WorkResult::success(Work::new(json!(1)), json!(1)));
        aggregator.clear();
        assert_eq!(aggregator.total(), 0);
    }
}
