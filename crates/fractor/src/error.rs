//! Crate-level error types

use crate::result::{ErrorCategory, ErrorSeverity};
use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fractor
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),

    #[error("Supervisor error: {0}")]
    Supervisor(String),

    #[error("Actor error: {0}")]
    Actor(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] crate::workflow::WorkflowError),

    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    #[error("Work timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new supervisor error
    pub fn supervisor<T: Into<String>>(msg: T) -> Self {
        Error::Supervisor(msg.into())
    }

    /// Create a new actor error
    pub fn actor<T: Into<String>>(msg: T) -> Self {
        Error::Actor(msg.into())
    }

    /// Get error category for monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Validation,
            Error::Queue(_) => ErrorCategory::System,
            Error::Timeout(_) => ErrorCategory::Timeout,
            Error::CircuitOpen(_) => ErrorCategory::Network,
            Error::Io(_) => ErrorCategory::System,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Get error severity for monitoring
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Error::Io(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("bad option");
        assert!(err.to_string().contains("bad option"));

        let err = Error::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::config("x").category(), ErrorCategory::Validation);
        assert_eq!(
            Error::Timeout(Duration::from_secs(1)).category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            Error::CircuitOpen("db".to_string()).category(),
            ErrorCategory::Network
        );
    }
}
