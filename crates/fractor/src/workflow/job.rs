//! Job definitions: nodes of the workflow DAG

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryConfig;
use crate::worker::WorkerFactory;
use crate::workflow::context::WorkflowContext;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Job execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting on dependencies
    Pending,

    /// Dependencies satisfied, not yet running
    Ready,

    /// Currently executing
    Running,

    /// Finished successfully (directly or through its fallback)
    Completed,

    /// Exhausted its recovery options
    Failed,

    /// Condition evaluated false, or an upstream job was skipped
    Skipped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Ready => write!(f, "ready"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
            JobState::Skipped => write!(f, "skipped"),
        }
    }
}

/// Where a job's input comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    /// The workflow input itself
    Workflow,

    /// The stored output of a named predecessor
    Job(String),
}

/// How a source payload maps onto the job input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingRule {
    /// Take the source payload whole (objects merge their fields)
    All,

    /// Copy named attributes: `target_attr -> source_attr`
    Fields(HashMap<String, String>),
}

/// One input-mapping declaration
#[derive(Debug, Clone)]
pub struct InputMapping {
    pub source: MappingSource,
    pub rule: MappingRule,
}

/// Condition predicate evaluated against the workflow context
pub type ConditionFn = Arc<dyn Fn(&WorkflowContext) -> bool + Send + Sync>;

/// A node in the workflow DAG: a worker binding plus orchestration
/// configuration
#[derive(Clone)]
pub struct Job {
    /// Unique job name
    pub name: String,

    /// Worker class backing this job
    pub factory: Arc<dyn WorkerFactory>,

    /// Names of predecessor jobs
    pub dependencies: Vec<String>,

    /// Worker count for the per-job supervisor run
    pub num_workers: Option<usize>,

    /// Input-mapping declarations; empty uses the default rule (single
    /// dependency's output, or the workflow input for root jobs)
    pub input_mappings: Vec<InputMapping>,

    /// Conditional-execution predicate; false skips the job
    pub condition: Option<ConditionFn>,

    /// Completing this job terminates the workflow
    pub terminates: bool,

    /// This job's output becomes the workflow output
    pub outputs_to_workflow: bool,

    /// Retry configuration; absent disables retries
    pub retry: Option<RetryConfig>,

    /// Circuit-breaker configuration; absent disables the breaker
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    /// Breaker sharing key; defaults to the job name
    pub circuit_breaker_key: Option<String>,

    /// Job to run when this one fails; its output is adopted on success
    pub fallback_job: Option<String>,

    /// Per-run state (set on the executor's working copy)
    pub state: JobState,
}

impl Job {
    pub fn new(name: impl Into<String>, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
            dependencies: Vec::new(),
            num_workers: None,
            input_mappings: Vec::new(),
            condition: None,
            terminates: false,
            outputs_to_workflow: false,
            retry: None,
            circuit_breaker: None,
            circuit_breaker_key: None,
            fallback_job: None,
            state: JobState::Pending,
        }
    }

    /// Add dependencies on named predecessors
    pub fn depends_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the worker count for this job's supervisor run
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = Some(num_workers);
        self
    }

    /// Map the workflow input directly as this job's input
    pub fn inputs_from_workflow(mut self) -> Self {
        self.input_mappings.push(InputMapping {
            source: MappingSource::Workflow,
            rule: MappingRule::All,
        });
        self
    }

    /// Take a predecessor's whole output as input
    pub fn inputs_from_job(mut self, name: impl Into<String>) -> Self {
        self.input_mappings.push(InputMapping {
            source: MappingSource::Job(name.into()),
            rule: MappingRule::All,
        });
        self
    }

    /// Copy named attributes from a predecessor's output:
    /// `(target_attr, source_attr)` pairs
    pub fn map_input(
        mut self,
        source: impl Into<String>,
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let fields = fields
            .into_iter()
            .map(|(t, s)| (t.into(), s.into()))
            .collect();
        self.input_mappings.push(InputMapping {
            source: MappingSource::Job(source.into()),
            rule: MappingRule::Fields(fields),
        });
        self
    }

    /// Run the job only when the predicate holds
    pub fn when(mut self, condition: ConditionFn) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Completing this job ends the workflow
    pub fn terminates_workflow(mut self) -> Self {
        self.terminates = true;
        self
    }

    /// Publish this job's output as the workflow output
    pub fn outputs_to_workflow(mut self) -> Self {
        self.outputs_to_workflow = true;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    /// Share a breaker across jobs under the given key
    pub fn with_circuit_breaker_key(mut self, key: impl Into<String>) -> Self {
        self.circuit_breaker_key = Some(key.into());
        self
    }

    pub fn with_fallback(mut self, job_name: impl Into<String>) -> Self {
        self.fallback_job = Some(job_name.into());
        self
    }

    /// Effective breaker key (the job name unless overridden)
    pub fn breaker_key(&self) -> &str {
        self.circuit_breaker_key.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("worker", &self.factory.worker_name())
            .field("dependencies", &self.dependencies)
            .field("terminates", &self.terminates)
            .field("state", &self.state)
            .finish()
    }
}
