//! Work results: tagged success/failure carriers with error metadata

use crate::work::Work;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Error categories derived from the failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Argument or type errors
    Validation,

    /// Deadline exceeded
    Timeout,

    /// Socket or connection errors
    Network,

    /// Stack or memory exhaustion
    System,

    /// Everything else
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::System => write!(f, "system"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl ErrorCategory {
    /// Categories worth retrying
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorCategory::Timeout | ErrorCategory::Network)
    }

    /// All categories, for stats iteration
    pub fn all() -> [ErrorCategory; 5] {
        [
            ErrorCategory::Validation,
            ErrorCategory::Timeout,
            ErrorCategory::Network,
            ErrorCategory::System,
            ErrorCategory::Unknown,
        ]
    }
}

/// Error severities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "critical"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Debug => write!(f, "debug"),
        }
    }
}

impl ErrorSeverity {
    /// All severities, for stats iteration
    pub fn all() -> [ErrorSeverity; 5] {
        [
            ErrorSeverity::Critical,
            ErrorSeverity::Error,
            ErrorSeverity::Warning,
            ErrorSeverity::Info,
            ErrorSeverity::Debug,
        ]
    }
}

/// Failure raised while processing a work item
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum WorkError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Work timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("System error: {0}")]
    System(String),

    #[error("{0}")]
    Other(String),
}

impl WorkError {
    /// Derived category: argument/type errors are validation, deadline
    /// errors timeout, socket errors network, stack/memory errors system,
    /// otherwise unknown
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkError::Validation(_) => ErrorCategory::Validation,
            WorkError::Timeout(_) => ErrorCategory::Timeout,
            WorkError::Network(_) => ErrorCategory::Network,
            WorkError::System(_) => ErrorCategory::System,
            WorkError::Other(_) => ErrorCategory::Unknown,
        }
    }

    /// Derived severity: system failures are critical, everything else error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            WorkError::System(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        WorkError::Timeout(duration.as_secs())
    }
}

/// Error metadata attached to a failed work result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error message
    pub message: String,

    /// Optional user-assigned error code
    pub code: Option<String>,

    /// Derived (or overridden) category
    pub category: ErrorCategory,

    /// Derived (or overridden) severity
    pub severity: ErrorSeverity,

    /// Free-form context mapping
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Build metadata from a work error, deriving category and severity
    pub fn from_error(error: &WorkError) -> Self {
        Self {
            message: error.to_string(),
            code: None,
            category: error.category(),
            severity: error.severity(),
            context: HashMap::new(),
        }
    }

    /// Build metadata from a bare message (category unknown)
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            category: ErrorCategory::Unknown,
            severity: ErrorSeverity::Error,
            context: HashMap::new(),
        }
    }

    /// Override the user error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Override the derived category
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// Override the derived severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Add a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Whether this error is worth retrying
    pub fn is_retriable(&self) -> bool {
        self.category.is_retriable()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.severity, self.message)
    }
}

/// Outcome of processing one work item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkResult {
    /// Successful processing
    Success {
        /// Output payload
        result: serde_json::Value,

        /// The originating work item
        work: Work,
    },

    /// Failed processing
    Failure {
        /// Error metadata
        error: ErrorInfo,

        /// The originating work item
        work: Work,
    },
}

impl WorkResult {
    /// Create a success result
    pub fn success(work: Work, result: impl Into<serde_json::Value>) -> Self {
        WorkResult::Success {
            result: result.into(),
            work,
        }
    }

    /// Create a failure result, deriving category and severity
    pub fn failure(work: Work, error: WorkError) -> Self {
        WorkResult::Failure {
            error: ErrorInfo::from_error(&error),
            work,
        }
    }

    /// Create a failure result with explicit metadata
    pub fn failure_with(work: Work, error: ErrorInfo) -> Self {
        WorkResult::Failure { error, work }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WorkResult::Failure { .. })
    }

    /// The originating work item
    pub fn work(&self) -> &Work {
        match self {
            WorkResult::Success { work, .. } => work,
            WorkResult::Failure { work, .. } => work,
        }
    }

    /// Output payload for success results
    pub fn result(&self) -> Option<&serde_json::Value> {
        match self {
            WorkResult::Success { result, .. } => Some(result),
            WorkResult::Failure { .. } => None,
        }
    }

    /// Error metadata for failure results
    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            WorkResult::Success { .. } => None,
            WorkResult::Failure { error, .. } => Some(error),
        }
    }
}
