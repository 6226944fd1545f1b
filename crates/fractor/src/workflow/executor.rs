//! Workflow executor: topological scheduling over the supervisor
//!
//! The executor validates the DAG, computes topological layers (Kahn's
//! algorithm: at each step, the jobs whose dependencies are all
//! completed), evaluates conditions, and delegates each job to a
//! supervisor run wrapped in the job's circuit breaker and retry
//! configuration. Failures fall back to the job's fallback (adopting its
//! output) or are dead-lettered and raised.

use crate::actor::WireProtocol;
use crate::circuit_breaker::{BreakerError, CircuitBreakerRegistry};
use crate::config::Config;
use crate::dead_letter::{DeadLetterQueue, DlqEntry};
use crate::result::{ErrorCategory, ErrorInfo, WorkResult};
use crate::retry::{AttemptFailure, RetryOrchestrator};
use crate::supervisor::{Supervisor, SupervisorOptions};
use crate::work::Work;
use crate::worker::{TypeTag, WorkerPool};
use crate::workflow::builder::{ChainBuilder, WorkflowBuilder};
use crate::workflow::context::WorkflowContext;
use crate::workflow::hooks::WorkflowHooks;
use crate::workflow::job::{Job, JobState, MappingSource};
use crate::workflow::trace::{ExecutionTrace, JobTrace};
use crate::workflow::validate::{validate_workflow, ValidationReport};
use crate::workflow::WorkflowError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How the jobs of one topological layer are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Jobs run one after another (the default safe mode)
    Sequential,

    /// Layer jobs run as concurrent sub-supervisors; outputs are stored
    /// only after the whole layer joins
    Parallel,

    /// One job per layer, validated up front together with reachability
    Pipeline,
}

/// A named DAG of jobs
#[derive(Clone)]
pub struct Workflow {
    pub(crate) name: String,
    pub(crate) jobs: Vec<Job>,
    pub(crate) end_job: Option<String>,
    pub(crate) strategy: ExecutionStrategy,
    pub(crate) pipeline_start: Option<String>,
}

impl Workflow {
    /// Start a builder
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    /// Start a chain builder (linear workflows)
    pub fn chain(name: impl Into<String>) -> ChainBuilder {
        ChainBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Validate the definition without executing
    pub fn validate(&self) -> ValidationReport {
        validate_workflow(&self.jobs, self.reachability_start().as_deref())
    }

    /// Execute with default configuration
    pub async fn execute(&self, input: Value) -> Result<WorkflowResult, WorkflowError> {
        WorkflowExecutor::new(self.clone(), Config::default())
            .execute(input)
            .await
    }

    fn reachability_start(&self) -> Option<String> {
        if self.strategy != ExecutionStrategy::Pipeline {
            return None;
        }
        self.pipeline_start
            .clone()
            .or_else(|| self.jobs.first().map(|j| j.name.clone()))
    }
}

/// Outcome of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub workflow_name: String,

    /// Resolved workflow output
    pub output: Value,

    /// Jobs completed, in completion order
    pub completed_jobs: Vec<String>,

    /// Jobs that exhausted their recovery options
    pub failed_jobs: Vec<String>,

    pub execution_time: Duration,

    pub success: bool,

    pub trace: Option<ExecutionTrace>,

    pub correlation_id: String,
}

/// User-registered pre-execution check; returned strings are errors
pub type ValidationHook = Arc<dyn Fn(&Workflow, &Value) -> Vec<String> + Send + Sync>;

/// Drives a validated workflow DAG
pub struct WorkflowExecutor {
    workflow: Workflow,
    config: Config,
    dlq: Arc<DeadLetterQueue>,
    registry: Arc<CircuitBreakerRegistry>,
    hooks: WorkflowHooks,
    validation_hooks: Vec<ValidationHook>,
    tracing_enabled: bool,
    wire_protocol: WireProtocol,
}

impl WorkflowExecutor {
    pub fn new(workflow: Workflow, config: Config) -> Self {
        Self {
            workflow,
            config,
            dlq: Arc::new(DeadLetterQueue::unbounded()),
            registry: Arc::new(CircuitBreakerRegistry::new()),
            hooks: WorkflowHooks::new(),
            validation_hooks: Vec::new(),
            tracing_enabled: true,
            wire_protocol: WireProtocol::Shared,
        }
    }

    /// Share a dead-letter queue across executors
    pub fn with_dlq(mut self, dlq: Arc<DeadLetterQueue>) -> Self {
        self.dlq = dlq;
        self
    }

    /// Share a circuit-breaker registry across executors
    pub fn with_registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the hook registry
    pub fn with_hooks(mut self, hooks: WorkflowHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Mutable access to the hook registry
    pub fn hooks_mut(&mut self) -> &mut WorkflowHooks {
        &mut self.hooks
    }

    /// Register a pre-execution validation hook
    pub fn with_validation_hook(mut self, hook: ValidationHook) -> Self {
        self.validation_hooks.push(hook);
        self
    }

    /// Disable trace collection
    pub fn without_tracing(mut self) -> Self {
        self.tracing_enabled = false;
        self
    }

    /// The dead-letter queue receiving exhausted failures
    pub fn dead_letter_queue(&self) -> Arc<DeadLetterQueue> {
        self.dlq.clone()
    }

    /// The circuit-breaker registry
    pub fn circuit_breakers(&self) -> Arc<CircuitBreakerRegistry> {
        self.registry.clone()
    }

    /// Run the workflow against the given input
    pub async fn execute(&self, input: Value) -> Result<WorkflowResult, WorkflowError> {
        self.pre_execution_validate(&input)?;

        let context = WorkflowContext::new(input);
        info!(
            "Workflow {} starting (correlation_id={})",
            self.workflow.name,
            context.correlation_id()
        );
        self.hooks.fire_workflow_start(&self.workflow.name);

        let mut run = Run::new(self, context);
        let outcome = run.drive().await;
        match outcome {
            Ok(()) => {
                self.hooks.fire_workflow_complete(&self.workflow.name);
                let result = run.finish();
                info!(
                    "Workflow {} completed in {:?} ({} jobs)",
                    self.workflow.name,
                    result.execution_time,
                    result.completed_jobs.len()
                );
                Ok(result)
            }
            Err((job, message)) => {
                let result = run.finish();
                warn!("Workflow {} failed at job '{}': {}", self.workflow.name, job, message);
                Err(WorkflowError::Execution {
                    job,
                    message,
                    result: Box::new(result),
                })
            }
        }
    }

    /// Pre-execution validation: workflow definition, input type
    /// conformance, and user-registered hooks, aggregated into one error
    fn pre_execution_validate(&self, input: &Value) -> Result<(), WorkflowError> {
        let mut report = self.workflow.validate();

        let input_tag = tag_of(input);
        for job in &self.workflow.jobs {
            let reads_workflow = job.dependencies.is_empty()
                || job
                    .input_mappings
                    .iter()
                    .any(|m| m.source == MappingSource::Workflow);
            if !reads_workflow {
                continue;
            }
            if let Some(declared) = job.factory.input_tag() {
                if !declared.accepts(input_tag) {
                    report.errors.push(format!(
                        "job '{}' declares input type {} but the workflow input is {}",
                        job.name, declared, input_tag
                    ));
                }
            }
        }

        for hook in &self.validation_hooks {
            report.errors.extend(hook(&self.workflow, input));
        }

        for warning in &report.warnings {
            warn!("Workflow {} validation: {}", self.workflow.name, warning);
        }

        if !report.errors.is_empty() {
            if self.config.workflow_validation_strict {
                return Err(WorkflowError::Validation {
                    errors: report.errors,
                    warnings: report.warnings,
                });
            }
            for error in &report.errors {
                warn!(
                    "Workflow {} validation (non-strict): {}",
                    self.workflow.name, error
                );
            }
        }

        Ok(())
    }
}

/// JSON value kind as a type tag (null conforms to anything)
fn tag_of(value: &Value) -> TypeTag {
    match value {
        Value::Null => TypeTag::Any,
        Value::Bool(_) => TypeTag::Boolean,
        Value::Number(n) => {
            if n.is_f64() {
                TypeTag::Float
            } else {
                TypeTag::Integer
            }
        }
        Value::String(_) => TypeTag::Text,
        Value::Array(_) => TypeTag::Array,
        Value::Object(_) => TypeTag::Object,
    }
}

/// Per-job execution engine, cloneable into parallel-layer tasks
#[derive(Clone)]
struct JobRunner {
    config: Config,
    dlq: Arc<DeadLetterQueue>,
    registry: Arc<CircuitBreakerRegistry>,
    wire_protocol: WireProtocol,
}

struct JobRunOutcome {
    result: Result<Value, AttemptFailure>,
    attempts: u32,
}

impl JobRunner {
    /// Run one job to a final outcome, applying retry around the circuit
    /// breaker around the supervisor run
    async fn run(&self, job: Job, input: Value) -> JobRunOutcome {
        let attempts = Arc::new(AtomicU32::new(0));

        let result = match &job.retry {
            Some(retry) => {
                let orchestrator =
                    RetryOrchestrator::new(retry.clone(), Some(self.dlq.clone()));
                let outcome = orchestrator
                    .execute_with_retry(&job.name, |_attempt| {
                        let runner = self.clone();
                        let job = job.clone();
                        let input = input.clone();
                        let attempts = attempts.clone();
                        async move {
                            attempts.fetch_add(1, Ordering::SeqCst);
                            runner.attempt(&job, input).await
                        }
                    })
                    .await;
                outcome.map_err(|(failure, _state)| failure)
            }
            None => {
                attempts.fetch_add(1, Ordering::SeqCst);
                self.attempt(&job, input).await
            }
        };

        JobRunOutcome {
            result,
            attempts: attempts.load(Ordering::SeqCst),
        }
    }

    /// One attempt: the circuit breaker gates the supervisor run
    async fn attempt(&self, job: &Job, input: Value) -> Result<Value, AttemptFailure> {
        match &job.circuit_breaker {
            Some(breaker_config) => {
                let orchestrator = self
                    .registry
                    .orchestrator_for(job.breaker_key(), breaker_config.clone());
                let runner = self.clone();
                let job_clone = job.clone();
                match orchestrator
                    .execute_with_breaker(&job.name, move || async move {
                        runner.supervise(&job_clone, input).await
                    })
                    .await
                {
                    Ok(value) => Ok(value),
                    Err(BreakerError::Inner(failure)) => Err(failure),
                    Err(BreakerError::Open(open)) => Err(AttemptFailure::new(
                        ErrorInfo::message(open.to_string())
                            .with_category(ErrorCategory::Network)
                            .with_code("circuit_open"),
                    )),
                }
            }
            None => self.supervise(job, input).await,
        }
    }

    /// Delegate one input to a fresh supervisor run with the job's worker
    /// class and configured worker count
    async fn supervise(&self, job: &Job, input: Value) -> Result<Value, AttemptFailure> {
        let pool = WorkerPool {
            factory: job.factory.clone(),
            num_workers: Some(job.num_workers.unwrap_or(1)),
        };
        let options = SupervisorOptions {
            continuous_mode: false,
            debug: self.config.debug,
            enable_performance_monitoring: false,
            wire_protocol: self.wire_protocol,
            config: self.config.clone(),
        };
        let supervisor = Supervisor::new(vec![pool], options);
        let work = Work::new(input);
        supervisor.add_work_item(work.clone());

        if let Err(e) = supervisor.run().await {
            return Err(AttemptFailure::with_work(
                ErrorInfo::message(e.to_string()),
                work,
            ));
        }

        let results = supervisor.results();
        if let Some(WorkResult::Success { result, .. }) = results.results().into_iter().next() {
            return Ok(result);
        }
        if let Some(WorkResult::Failure { error, work }) = results.errors().into_iter().next() {
            return Err(AttemptFailure::with_work(error, work));
        }
        Err(AttemptFailure::with_work(
            ErrorInfo::message(format!("job '{}' produced no result", job.name)),
            work,
        ))
    }
}

/// Mutable state of one run
struct Run<'a> {
    executor: &'a WorkflowExecutor,
    runner: JobRunner,
    context: WorkflowContext,
    trace: ExecutionTrace,
    states: HashMap<String, JobState>,
    fallback_targets: HashSet<String>,
    completed: Vec<String>,
    failed: Vec<String>,
    started: Instant,
}

impl<'a> Run<'a> {
    fn new(executor: &'a WorkflowExecutor, context: WorkflowContext) -> Self {
        let states = executor
            .workflow
            .jobs
            .iter()
            .map(|j| (j.name.clone(), JobState::Pending))
            .collect();
        // Jobs referenced as fallbacks run only on demand
        let fallback_targets = executor
            .workflow
            .jobs
            .iter()
            .filter_map(|j| j.fallback_job.clone())
            .collect();
        let trace = ExecutionTrace::new(&executor.workflow.name, context.correlation_id());
        let runner = JobRunner {
            config: executor.config.clone(),
            dlq: executor.dlq.clone(),
            registry: executor.registry.clone(),
            wire_protocol: executor.wire_protocol,
        };

        Self {
            executor,
            runner,
            context,
            trace,
            states,
            fallback_targets,
            completed: Vec::new(),
            failed: Vec::new(),
            started: Instant::now(),
        }
    }

    fn state(&self, name: &str) -> JobState {
        self.states.get(name).copied().unwrap_or(JobState::Pending)
    }

    fn set_state(&mut self, name: &str, state: JobState) {
        self.states.insert(name.to_string(), state);
    }

    fn job(&self, name: &str) -> Option<&Job> {
        self.executor.workflow.jobs.iter().find(|j| j.name == name)
    }

    /// Drive the DAG layer by layer. The error value is `(job, message)`
    /// for the unrecoverable failure.
    async fn drive(&mut self) -> Result<(), (String, String)> {
        'run: loop {
            self.cascade_skips();

            let layer = self.next_layer();
            if layer.is_empty() {
                let stuck: Vec<String> = self
                    .executor
                    .workflow
                    .jobs
                    .iter()
                    .filter(|j| {
                        self.state(&j.name) == JobState::Pending
                            && !self.fallback_targets.contains(&j.name)
                    })
                    .map(|j| j.name.clone())
                    .collect();
                if !stuck.is_empty() {
                    return Err((
                        stuck[0].clone(),
                        format!("jobs {:?} have unsatisfiable dependencies", stuck),
                    ));
                }
                break;
            }

            if self.executor.workflow.strategy == ExecutionStrategy::Pipeline && layer.len() != 1
            {
                return Err((
                    layer[0].name.clone(),
                    "pipeline strategy requires exactly one job per layer".to_string(),
                ));
            }

            // Conditional execution: skipped jobs advance state and
            // contribute no output
            let mut runnable: Vec<Job> = Vec::new();
            for job in layer {
                if let Some(condition) = &job.condition {
                    if !condition(&self.context) {
                        info!("Job {} skipped by condition", job.name);
                        self.set_state(&job.name, JobState::Skipped);
                        if self.executor.tracing_enabled {
                            self.trace.record(JobTrace::skipped(&job.name));
                        }
                        continue;
                    }
                }
                self.set_state(&job.name, JobState::Ready);
                runnable.push(job);
            }
            if runnable.is_empty() {
                continue;
            }

            match self.executor.workflow.strategy {
                ExecutionStrategy::Sequential | ExecutionStrategy::Pipeline => {
                    for job in runnable {
                        let terminated = self.execute_job(&job).await?;
                        if terminated {
                            break 'run;
                        }
                    }
                }
                ExecutionStrategy::Parallel => {
                    let terminated = self.execute_layer_parallel(runnable).await?;
                    if terminated {
                        break 'run;
                    }
                }
            }
        }

        Ok(())
    }

    /// Pending jobs whose dependencies are all completed, in definition
    /// order. Fallback-only jobs are excluded from scheduling.
    fn next_layer(&self) -> Vec<Job> {
        self.executor
            .workflow
            .jobs
            .iter()
            .filter(|job| {
                self.state(&job.name) == JobState::Pending
                    && !self.fallback_targets.contains(&job.name)
                    && job
                        .dependencies
                        .iter()
                        .all(|dep| self.state(dep) == JobState::Completed)
            })
            .cloned()
            .collect()
    }

    /// A job whose dependency was skipped can never satisfy the
    /// completed-dependencies invariant, so it is skipped as well
    fn cascade_skips(&mut self) {
        loop {
            let to_skip: Vec<String> = self
                .executor
                .workflow
                .jobs
                .iter()
                .filter(|job| {
                    self.state(&job.name) == JobState::Pending
                        && !self.fallback_targets.contains(&job.name)
                        && job
                            .dependencies
                            .iter()
                            .any(|dep| self.state(dep) == JobState::Skipped)
                })
                .map(|job| job.name.clone())
                .collect();
            if to_skip.is_empty() {
                return;
            }
            for name in to_skip {
                info!("Job {} skipped (upstream skipped)", name);
                self.set_state(&name, JobState::Skipped);
                if self.executor.tracing_enabled {
                    self.trace.record(JobTrace::skipped(&name));
                }
            }
        }
    }

    /// Execute one job sequentially; returns whether it terminated the
    /// workflow
    async fn execute_job(&mut self, job: &Job) -> Result<bool, (String, String)> {
        let input = match self.context.build_job_input(job) {
            Ok(input) => input,
            Err(e) => {
                let failure = AttemptFailure::new(
                    ErrorInfo::message(e.to_string()).with_category(ErrorCategory::Validation),
                );
                return self
                    .absorb_failure(job, None, failure, 0)
                    .await
                    .map(|_| false);
            }
        };

        self.set_state(&job.name, JobState::Running);
        self.executor.hooks.fire_job_start(&job.name);
        let mut job_trace = self
            .executor
            .tracing_enabled
            .then(|| JobTrace::start(&job.name, Some(&input)));

        let outcome = self.runner.run(job.clone(), input.clone()).await;
        if let Some(trace) = &mut job_trace {
            trace.attempts = outcome.attempts;
        }

        match outcome.result {
            Ok(output) => {
                self.complete_job(job, output, job_trace, false);
                Ok(job.terminates)
            }
            Err(failure) => {
                if let Some(trace) = job_trace.take() {
                    self.trace.record(trace);
                }
                self.absorb_failure(job, Some(&input), failure, outcome.attempts)
                    .await?;
                Ok(false)
            }
        }
    }

    /// Execute a whole layer as concurrent sub-supervisors. Outputs are
    /// stored only after every job in the layer has finished, so no
    /// reader observes half-completed layer outputs.
    async fn execute_layer_parallel(
        &mut self,
        runnable: Vec<Job>,
    ) -> Result<bool, (String, String)> {
        let mut handles = Vec::new();
        let mut immediate_failures: Vec<(Job, AttemptFailure)> = Vec::new();

        for job in runnable {
            let input = match self.context.build_job_input(&job) {
                Ok(input) => input,
                Err(e) => {
                    immediate_failures.push((
                        job,
                        AttemptFailure::new(
                            ErrorInfo::message(e.to_string())
                                .with_category(ErrorCategory::Validation),
                        ),
                    ));
                    continue;
                }
            };

            self.set_state(&job.name, JobState::Running);
            self.executor.hooks.fire_job_start(&job.name);
            let job_trace = self
                .executor
                .tracing_enabled
                .then(|| JobTrace::start(&job.name, Some(&input)));

            let runner = self.runner.clone();
            let task_job = job.clone();
            let task_input = input.clone();
            let handle =
                tokio::spawn(async move { runner.run(task_job, task_input).await });
            handles.push((job, input, job_trace, handle));
        }

        // Barrier: collect every outcome before storing any output
        let mut finished = Vec::new();
        for (job, input, job_trace, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => JobRunOutcome {
                    result: Err(AttemptFailure::new(ErrorInfo::message(format!(
                        "job task failed: {}",
                        join_error
                    )))),
                    attempts: 0,
                },
            };
            finished.push((job, input, job_trace, outcome));
        }

        let mut terminated = false;
        for (job, input, mut job_trace, outcome) in finished {
            if let Some(trace) = &mut job_trace {
                trace.attempts = outcome.attempts;
            }
            match outcome.result {
                Ok(output) => {
                    self.complete_job(&job, output, job_trace, false);
                    terminated |= job.terminates;
                }
                Err(failure) => {
                    if let Some(trace) = job_trace.take() {
                        self.trace.record(trace);
                    }
                    self.absorb_failure(&job, Some(&input), failure, outcome.attempts)
                        .await?;
                }
            }
        }

        for (job, failure) in immediate_failures {
            self.absorb_failure(&job, None, failure, 0).await?;
        }

        Ok(terminated)
    }

    fn complete_job(
        &mut self,
        job: &Job,
        output: Value,
        job_trace: Option<JobTrace>,
        fallback_used: bool,
    ) {
        if let Some(mut trace) = job_trace {
            trace.fallback_used = fallback_used;
            trace.complete(&output);
            self.trace.record(trace);
        }
        self.context.store_output(&job.name, output);
        self.set_state(&job.name, JobState::Completed);
        self.completed.push(job.name.clone());
        self.executor.hooks.fire_job_complete(&job.name);
        info!("Job {} completed", job.name);
    }

    /// Record a failure, attempt the fallback, and either recover or
    /// dead-letter and abort the run
    async fn absorb_failure(
        &mut self,
        job: &Job,
        input: Option<&Value>,
        failure: AttemptFailure,
        attempts: u32,
    ) -> Result<(), (String, String)> {
        self.set_state(&job.name, JobState::Failed);
        self.failed.push(job.name.clone());
        self.executor.hooks.fire_job_error(&job.name, &failure.error);

        if let Some(fallback_name) = &job.fallback_job {
            if let Some(fallback_job) = self.job(fallback_name).cloned() {
                if let Some(input) = input {
                    info!("Job {} falling back to {}", job.name, fallback_name);
                    let outcome = self.runner.run(fallback_job, input.clone()).await;
                    if let Ok(output) = outcome.result {
                        // Fallback success adopts the output and marks the
                        // original job completed
                        self.failed.retain(|name| name != &job.name);
                        let mut trace = self
                            .executor
                            .tracing_enabled
                            .then(|| JobTrace::start(&job.name, Some(input)));
                        if let Some(t) = &mut trace {
                            t.attempts = attempts;
                        }
                        self.complete_job(job, output, trace, true);
                        return Ok(());
                    }
                    warn!("Fallback {} for job {} failed too", fallback_name, job.name);
                }
            }
        }

        // Retry exhaustion already dead-letters; cover the no-retry path
        if job.retry.is_none() {
            let work = failure
                .work
                .clone()
                .unwrap_or_else(|| Work::new(input.cloned().unwrap_or(Value::Null)));
            self.executor.dlq.push(
                DlqEntry::new(work, failure.error.clone())
                    .with_context("job", &job.name)
                    .with_context("workflow", &self.executor.workflow.name)
                    .with_metadata("correlation_id", self.context.correlation_id()),
            );
        }

        Err((job.name.clone(), failure.error.to_string()))
    }

    /// Resolve the workflow output and assemble the run result
    fn finish(mut self) -> WorkflowResult {
        self.trace.finish();

        let output = self.resolve_output();
        let success = self.failed.is_empty();

        WorkflowResult {
            workflow_name: self.executor.workflow.name.clone(),
            output,
            completed_jobs: self.completed,
            failed_jobs: self.failed,
            execution_time: self.started.elapsed(),
            success,
            correlation_id: self.context.correlation_id().to_string(),
            trace: self.executor.tracing_enabled.then_some(self.trace),
        }
    }

    /// First completed job flagged `outputs_to_workflow`, falling back to
    /// the configured end job, then the last completed job
    fn resolve_output(&self) -> Value {
        let flagged = self.completed.iter().find(|name| {
            self.job(name)
                .map(|job| job.outputs_to_workflow)
                .unwrap_or(false)
        });
        let chosen = flagged
            .or_else(|| {
                self.executor
                    .workflow
                    .end_job
                    .as_ref()
                    .filter(|end| self.completed.iter().any(|c| &c == end))
            })
            .or_else(|| self.completed.last());

        chosen
            .and_then(|name| self.context.output_of(name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}
