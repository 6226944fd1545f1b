//! Categorized error statistics and reporting

use crate::result::{ErrorCategory, ErrorInfo, ErrorSeverity};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{error, warn};

const MAX_RECENT_ERRORS: usize = 500;

struct RecordedError {
    label: String,
    message: String,
    category: ErrorCategory,
    severity: ErrorSeverity,
    at: DateTime<Utc>,
}

/// Collects error events, computes categorized statistics, and renders a
/// human-readable report. The recent-error window is bounded; counters
/// are exact.
#[derive(Default)]
pub struct ErrorReporter {
    inner: Mutex<ReporterInner>,
}

#[derive(Default)]
struct ReporterInner {
    successes: u64,
    by_category: HashMap<ErrorCategory, u64>,
    by_severity: HashMap<ErrorSeverity, u64>,
    by_label: HashMap<String, u64>,
    recent: Vec<RecordedError>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful completion (for error-rate computation)
    pub fn record_success(&self) {
        self.inner.lock().unwrap().successes += 1;
    }

    /// Record an error under a label (worker class or job name)
    pub fn record_error(&self, label: &str, info: &ErrorInfo) {
        match info.severity {
            ErrorSeverity::Critical => {
                error!("[{}] {} (category={})", label, info.message, info.category)
            }
            _ => warn!("[{}] {} (category={})", label, info.message, info.category),
        }

        let mut inner = self.inner.lock().unwrap();
        *inner.by_category.entry(info.category).or_insert(0) += 1;
        *inner.by_severity.entry(info.severity).or_insert(0) += 1;
        *inner.by_label.entry(label.to_string()).or_insert(0) += 1;

        inner.recent.push(RecordedError {
            label: label.to_string(),
            message: info.message.clone(),
            category: info.category,
            severity: info.severity,
            at: Utc::now(),
        });
        if inner.recent.len() > MAX_RECENT_ERRORS {
            let excess = inner.recent.len() - MAX_RECENT_ERRORS;
            inner.recent.drain(..excess);
        }
    }

    /// Snapshot current statistics
    pub fn stats(&self) -> ErrorStats {
        let inner = self.inner.lock().unwrap();
        let errors_total: u64 = inner.by_severity.values().sum();
        let total = errors_total + inner.successes;

        let window_start = Utc::now() - ChronoDuration::minutes(5);
        let recent_count = inner.recent.iter().filter(|e| e.at >= window_start).count() as u64;

        ErrorStats {
            errors_total,
            successes_total: inner.successes,
            error_rate: if total > 0 {
                errors_total as f64 / total as f64
            } else {
                0.0
            },
            by_category: inner.by_category.clone(),
            by_severity: inner.by_severity.clone(),
            by_label: inner.by_label.clone(),
            errors_last_5m: recent_count,
        }
    }

    /// Render the formatted report: summary, top categories, top labels,
    /// critical errors, trending
    pub fn report(&self) -> String {
        let stats = self.stats();
        let inner = self.inner.lock().unwrap();

        let mut lines = vec![
            "=== Error Report ===".to_string(),
            format!(
                "Summary: {} errors / {} successes ({:.1}% error rate)",
                stats.errors_total,
                stats.successes_total,
                stats.error_rate * 100.0
            ),
        ];

        let mut categories: Vec<_> = stats.by_category.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1));
        lines.push("Top categories:".to_string());
        for (category, count) in categories.iter().take(5) {
            lines.push(format!("  {}: {}", category, count));
        }

        let mut labels: Vec<_> = stats.by_label.iter().collect();
        labels.sort_by(|a, b| b.1.cmp(a.1));
        lines.push("Top sources:".to_string());
        for (label, count) in labels.iter().take(5) {
            lines.push(format!("  {}: {}", label, count));
        }

        let criticals: Vec<_> = inner
            .recent
            .iter()
            .filter(|e| e.severity == ErrorSeverity::Critical)
            .collect();
        if !criticals.is_empty() {
            lines.push(format!("Critical errors ({}):", criticals.len()));
            for e in criticals.iter().rev().take(5) {
                lines.push(format!("  [{}] {} ({})", e.label, e.message, e.category));
            }
        }

        lines.push(format!(
            "Trending: {} errors in the last 5 minutes",
            stats.errors_last_5m
        ));

        lines.join("\n")
    }

    /// Drop all recorded data
    pub fn clear(&self) {
        *self.inner.lock().unwrap() = ReporterInner::default();
    }
}

/// Snapshot of error statistics
#[derive(Debug, Clone)]
pub struct ErrorStats {
    /// Total errors recorded
    pub errors_total: u64,

    /// Total successes recorded
    pub successes_total: u64,

    /// errors / (errors + successes)
    pub error_rate: f64,

    /// Error counts by category
    pub by_category: HashMap<ErrorCategory, u64>,

    /// Error counts by severity
    pub by_severity: HashMap<ErrorSeverity, u64>,

    /// Error counts by source label
    pub by_label: HashMap<String, u64>,

    /// Errors recorded within the trailing five minutes
    pub errors_last_5m: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::WorkError;

    #[test]
    fn test_stats_accumulation() {
        let reporter = ErrorReporter::new();
        reporter.record_success();
        reporter.record_success();
        reporter.record_success();
        reporter.record_error(
            "fetcher",
            &ErrorInfo::from_error(&WorkError::Network("refused".into())),
        );

        let stats = reporter.stats();
        assert_eq!(stats.errors_total, 1);
        assert_eq!(stats.successes_total, 3);
        assert!((stats.error_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(stats.by_category.get(&ErrorCategory::Network), Some(&1));
        assert_eq!(stats.by_severity.get(&ErrorSeverity::Error), Some(&1));
        assert_eq!(stats.by_label.get("fetcher"), Some(&1));
        assert_eq!(stats.errors_last_5m, 1);
    }

    #[test]
    fn test_report_sections() {
        let reporter = ErrorReporter::new();
        reporter.record_error(
            "parser",
            &ErrorInfo::from_error(&WorkError::System("out of memory".into())),
        );

        let report = reporter.report();
        assert!(report.contains("Error Report"));
        assert!(report.contains("system: 1"));
        assert!(report.contains("parser: 1"));
        assert!(report.contains("Critical errors (1):"));
        assert!(report.contains("Trending"));
    }

    #[test]
    fn test_recent_window_bounded() {
        let reporter = ErrorReporter::new();
        let info = ErrorInfo::from_error(&WorkError::Other("x".into()));
        for _ in 0..(MAX_RECENT_ERRORS + 50) {
            reporter.record_error("w", &info);
        }
        assert_eq!(reporter.inner.lock().unwrap().recent.len(), MAX_RECENT_ERRORS);
        // Counters stay exact even after the window evicts
        assert_eq!(reporter.stats().errors_total, (MAX_RECENT_ERRORS + 50) as u64);
    }
}
