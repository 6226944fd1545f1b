//! Work items: the immutable units of input consumed by workers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Priority levels for prioritized work
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Processed before everything else
    Critical = 0,

    /// Processed before normal traffic
    High = 1,

    /// Default priority
    Normal = 2,

    /// Processed after normal traffic
    Low = 3,

    /// Processed only when nothing else is pending
    Background = 4,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Normal => write!(f, "normal"),
            Priority::Low => write!(f, "low"),
            Priority::Background => write!(f, "background"),
        }
    }
}

impl Priority {
    /// Numeric value (lower processes first)
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Build from a numeric value, clamping to the valid range
    pub fn from_value(value: u8) -> Self {
        match value {
            0 => Priority::Critical,
            1 => Priority::High,
            2 => Priority::Normal,
            3 => Priority::Low,
            _ => Priority::Background,
        }
    }

    /// Promote by `levels`, bounded at `Critical`
    pub fn promoted(&self, levels: u8) -> Self {
        Self::from_value(self.value().saturating_sub(levels))
    }
}

/// One unit of input for processing.
///
/// Immutable once constructed; the payload is an opaque JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    input: serde_json::Value,

    /// Per-item timeout (seconds); overrides the worker's timeout
    timeout_secs: Option<u64>,
}

impl Work {
    /// Create a new work item
    pub fn new(input: impl Into<serde_json::Value>) -> Self {
        Self {
            input: input.into(),
            timeout_secs: None,
        }
    }

    /// Set a per-item timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// The opaque input payload
    pub fn input(&self) -> &serde_json::Value {
        &self.input
    }

    /// Consume the item and take the payload
    pub fn into_input(self) -> serde_json::Value {
        self.input
    }

    /// Per-item timeout, if declared
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Raw timeout seconds (persistence record form)
    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    /// Short single-line description for queue inspection
    pub fn summary(&self) -> String {
        let rendered = self.input.to_string();
        if rendered.chars().count() <= 60 {
            return rendered;
        }
        // Truncate on char boundaries; payloads may hold multibyte text
        let truncated: String = rendered.chars().take(57).collect();
        format!("{}...", truncated)
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Work({})", self.summary())
    }
}

/// A work item with a priority level and creation timestamp.
///
/// Ordered by `(priority, created_at)`: higher priority (lower numeric
/// value) first, FIFO within a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityWork {
    work: Work,
    priority: Priority,
    created_at: DateTime<Utc>,
}

impl PriorityWork {
    /// Create a prioritized work item
    pub fn new(input: impl Into<serde_json::Value>, priority: Priority) -> Self {
        Self {
            work: Work::new(input),
            priority,
            created_at: Utc::now(),
        }
    }

    /// Wrap an existing work item
    pub fn from_work(work: Work, priority: Priority) -> Self {
        Self {
            work,
            priority,
            created_at: Utc::now(),
        }
    }

    /// The underlying work item
    pub fn work(&self) -> &Work {
        &self.work
    }

    /// Consume and take the underlying work item
    pub fn into_work(self) -> Work {
        self.work
    }

    /// Declared priority
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Age of the item relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Priority after aging promotion: one level per elapsed
    /// `aging_threshold`, bounded at `Critical`
    pub fn effective_priority(
        &self,
        now: DateTime<Utc>,
        aging_threshold: Option<Duration>,
    ) -> Priority {
        match aging_threshold {
            Some(threshold) if !threshold.is_zero() => {
                let levels = (self.age(now).as_secs_f64() / threshold.as_secs_f64()) as u8;
                self.priority.promoted(levels)
            }
            _ => self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
        assert!(Priority::Low < Priority::Background);
        assert_eq!(Priority::Critical.value(), 0);
        assert_eq!(Priority::Background.value(), 4);
    }

    #[test]
    fn test_priority_promotion() {
        assert_eq!(Priority::Low.promoted(1), Priority::Normal);
        assert_eq!(Priority::Low.promoted(3), Priority::Critical);
        // Bounded at critical
        assert_eq!(Priority::High.promoted(5), Priority::Critical);
    }

    #[test]
    fn test_work_creation() {
        let work = Work::new(serde_json::json!({"n": 5}));
        assert_eq!(work.input()["n"], 5);
        assert!(work.timeout().is_none());

        let work = work.with_timeout(Duration::from_secs(30));
        assert_eq!(work.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_work_summary_truncates() {
        let long = "x".repeat(200);
        let work = Work::new(serde_json::json!(long));
        assert!(work.summary().len() <= 60);
        assert!(work.summary().ends_with("..."));
    }

    #[test]
    fn test_work_summary_truncates_multibyte_payloads() {
        let long = "日本語".repeat(40);
        let work = Work::new(serde_json::json!(long));

        let summary = work.summary();
        assert!(summary.chars().count() <= 60);
        assert!(summary.ends_with("..."));
        // Display goes through the same truncation
        assert!(work.to_string().starts_with("Work("));
    }

    #[test]
    fn test_effective_priority_aging() {
        let mut item = PriorityWork::new(serde_json::json!(1), Priority::Background);
        item.created_at = Utc::now() - chrono::Duration::seconds(25);

        let threshold = Some(Duration::from_secs(10));
        // 25s old with a 10s threshold promotes 2 levels: background -> normal
        assert_eq!(
            item.effective_priority(Utc::now(), threshold),
            Priority::Normal
        );

        // Aging disabled leaves the declared priority untouched
        assert_eq!(item.effective_priority(Utc::now(), None), Priority::Background);
    }
}
