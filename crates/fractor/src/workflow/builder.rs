//! Programmatic workflow construction

use crate::worker::WorkerFactory;
use crate::workflow::executor::{ExecutionStrategy, Workflow};
use crate::workflow::job::Job;
use std::sync::Arc;

/// Builder for arbitrary DAG workflows
pub struct WorkflowBuilder {
    name: String,
    jobs: Vec<Job>,
    end_job: Option<String>,
    strategy: ExecutionStrategy,
    pipeline_start: Option<String>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
            end_job: None,
            strategy: ExecutionStrategy::Sequential,
            pipeline_start: None,
        }
    }

    /// Add a job definition
    pub fn add_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// Name the job whose output becomes the workflow output when no job
    /// is flagged `outputs_to_workflow`
    pub fn end_with(mut self, job_name: impl Into<String>) -> Self {
        self.end_job = Some(job_name.into());
        self
    }

    /// Choose the layer execution strategy
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Pipeline mode: the job reachability starts from
    pub fn start_with(mut self, job_name: impl Into<String>) -> Self {
        self.pipeline_start = Some(job_name.into());
        self
    }

    /// Assemble the workflow. Validation happens at execution time (or
    /// explicitly through [`Workflow::validate`]).
    pub fn build(self) -> Workflow {
        Workflow {
            name: self.name,
            jobs: self.jobs,
            end_job: self.end_job,
            strategy: self.strategy,
            pipeline_start: self.pipeline_start,
        }
    }
}

/// Builder for linear workflows: each step depends on the previous one
/// and consumes its output; the first step reads the workflow input.
pub struct ChainBuilder {
    name: String,
    jobs: Vec<Job>,
}

impl ChainBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
        }
    }

    /// Append a step backed by the given worker class
    pub fn then(mut self, job_name: impl Into<String>, factory: Arc<dyn WorkerFactory>) -> Self {
        let job_name = job_name.into();
        let job = match self.jobs.last() {
            Some(previous) => Job::new(&job_name, factory)
                .depends_on([previous.name.clone()])
                .inputs_from_job(previous.name.clone()),
            None => Job::new(&job_name, factory).inputs_from_workflow(),
        };
        self.jobs.push(job);
        self
    }

    /// Customize the most recently added step
    pub fn configure(mut self, customize: impl FnOnce(Job) -> Job) -> Self {
        if let Some(job) = self.jobs.pop() {
            self.jobs.push(customize(job));
        }
        self
    }

    /// Assemble the chain as a pipeline-strategy workflow ending at the
    /// last step
    pub fn build(self) -> Workflow {
        let end_job = self.jobs.last().map(|j| j.name.clone());
        let pipeline_start = self.jobs.first().map(|j| j.name.clone());
        Workflow {
            name: self.name,
            jobs: self.jobs,
            end_job,
            strategy: ExecutionStrategy::Pipeline,
            pipeline_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::WorkResult;
    use crate::retry::{RetryConfig, RetryStrategy};
    use crate::work::Work;
    use crate::worker::{SharedWorkerFactory, Worker};
    use serde_json::json;

    struct Echo;

    #[async_trait::async_trait]
    impl Worker for Echo {
        async fn process(&self, work: Work) -> WorkResult {
            let input = work.input().clone();
            WorkResult::success(work, input)
        }
    }

    fn factory() -> Arc<dyn WorkerFactory> {
        Arc::new(SharedWorkerFactory::new("echo", Arc::new(Echo)))
    }

    #[test]
    fn test_builder_assembles_dag() {
        let workflow = Workflow::builder("etl")
            .add_job(Job::new("extract", factory()))
            .add_job(Job::new("load", factory()).depends_on(["extract"]))
            .end_with("load")
            .build();

        assert_eq!(workflow.name(), "etl");
        assert_eq!(workflow.jobs().len(), 2);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_chain_wires_dependencies() {
        let workflow = Workflow::chain("linear")
            .then("one", factory())
            .then("two", factory())
            .then("three", factory())
            .build();

        let jobs = workflow.jobs();
        assert!(jobs[0].dependencies.is_empty());
        assert_eq!(jobs[1].dependencies, vec!["one"]);
        assert_eq!(jobs[2].dependencies, vec!["two"]);
        assert_eq!(workflow.strategy, ExecutionStrategy::Pipeline);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_chain_configure_applies_to_last_step() {
        let workflow = Workflow::chain("tuned")
            .then("step", factory())
            .configure(|job| {
                job.with_retry(RetryConfig::new(RetryStrategy::NoRetry))
                    .with_workers(3)
            })
            .build();

        let job = &workflow.jobs()[0];
        assert!(job.retry.is_some());
        assert_eq!(job.num_workers, Some(3));
    }

    #[tokio::test]
    async fn test_chain_executes_in_order() {
        let workflow = Workflow::chain("passthrough")
            .then("a", factory())
            .then("b", factory())
            .build();

        let result = workflow.execute(json!("data")).await.unwrap();
        assert!(result.success);
        assert_eq!(result.completed_jobs, vec!["a", "b"]);
        assert_eq!(result.output, json!("data"));
    }
}
