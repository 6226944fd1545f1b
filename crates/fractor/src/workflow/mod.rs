//! Workflow core: a DAG of named jobs orchestrated above the supervisor
//!
//! Each job binds a worker class, declares its dependencies and input
//! mappings, and may carry retry, circuit-breaker, and fallback
//! configuration. The executor runs the DAG in topological layers,
//! delegating each job to a supervisor run and recording a structured
//! trace.

pub mod builder;
pub mod context;
pub mod executor;
pub mod hooks;
pub mod job;
pub mod trace;
pub mod validate;

pub use builder::{ChainBuilder, WorkflowBuilder};
pub use context::WorkflowContext;
pub use executor::{ExecutionStrategy, Workflow, WorkflowExecutor, WorkflowResult};
pub use hooks::WorkflowHooks;
pub use job::{InputMapping, Job, JobState, MappingRule, MappingSource};
pub use trace::{ExecutionTrace, JobTrace};
pub use validate::ValidationReport;

/// Errors raised by workflow validation and execution
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// Aggregated pre-execution validation failure
    #[error("Workflow validation failed: {}", errors.join("; "))]
    Validation {
        errors: Vec<String>,
        warnings: Vec<String>,
    },

    /// Dependency-graph error (missing dependency, cycle)
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Malformed workflow or job definition
    #[error("Workflow definition error: {0}")]
    Definition(String),

    /// A job exhausted its recovery options; the work item was
    /// dead-lettered. Carries the partial run result so consumers can
    /// inspect failed jobs and the trace.
    #[error("Job '{job}' failed: {message}")]
    Execution {
        job: String,
        message: String,
        result: Box<WorkflowResult>,
    },
}

impl WorkflowError {
    /// Partial result for execution failures
    pub fn partial_result(&self) -> Option<&WorkflowResult> {
        match self {
            WorkflowError::Execution { result, .. } => Some(result),
            _ => None,
        }
    }
}
