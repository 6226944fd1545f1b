//! Workflow end-to-end scenarios
//!
//! Covers the three-job typed chain, cycle rejection, retry backoff
//! against a flaky worker, circuit-breaker recovery, and dead-letter
//! behavior across a run.

use fractor::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, Config, Job, RetryConfig, RetryStrategy,
    SharedWorkerFactory, TypeTag, Work, WorkError, WorkResult, Worker, WorkerFactory, Workflow,
    WorkflowError, WorkflowExecutor,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Upcase;

#[async_trait::async_trait]
impl Worker for Upcase {
    async fn process(&self, work: Work) -> WorkResult {
        match work.input().as_str() {
            Some(s) => {
                let up = s.to_uppercase();
                WorkResult::success(work, json!(up))
            }
            None => WorkResult::failure(work, WorkError::Validation("expected a string".into())),
        }
    }
}

struct Length;

#[async_trait::async_trait]
impl Worker for Length {
    async fn process(&self, work: Work) -> WorkResult {
        match work.input().as_str() {
            Some(s) => {
                let n = s.len() as i64;
                WorkResult::success(work, json!(n))
            }
            None => WorkResult::failure(work, WorkError::Validation("expected a string".into())),
        }
    }
}

struct Square;

#[async_trait::async_trait]
impl Worker for Square {
    async fn process(&self, work: Work) -> WorkResult {
        match work.input().as_i64() {
            Some(n) => WorkResult::success(work, json!(n * n)),
            None => WorkResult::failure(work, WorkError::Validation("expected an integer".into())),
        }
    }
}

struct Echo;

#[async_trait::async_trait]
impl Worker for Echo {
    async fn process(&self, work: Work) -> WorkResult {
        let input = work.input().clone();
        WorkResult::success(work, input)
    }
}

fn echo_factory() -> Arc<dyn WorkerFactory> {
    Arc::new(SharedWorkerFactory::new("echo", Arc::new(Echo)))
}

/// Three typed jobs a -> b -> c: upcase, then length, then square.
/// "hello" flows to 25 with all jobs completed in order.
#[tokio::test]
async fn typed_three_job_chain() {
    let workflow = Workflow::builder("text-metrics")
        .add_job(Job::new(
            "a",
            Arc::new(
                SharedWorkerFactory::new("upcase", Arc::new(Upcase))
                    .with_input_tag(TypeTag::Text)
                    .with_output_tag(TypeTag::Text),
            ),
        ))
        .add_job(
            Job::new(
                "b",
                Arc::new(
                    SharedWorkerFactory::new("length", Arc::new(Length))
                        .with_input_tag(TypeTag::Text)
                        .with_output_tag(TypeTag::Integer),
                ),
            )
            .depends_on(["a"]),
        )
        .add_job(
            Job::new(
                "c",
                Arc::new(
                    SharedWorkerFactory::new("square", Arc::new(Square))
                        .with_input_tag(TypeTag::Integer)
                        .with_output_tag(TypeTag::Integer),
                ),
            )
            .depends_on(["b"]),
        )
        .end_with("c")
        .build();

    // Declared types line up, so validation is clean
    let report = workflow.validate();
    assert!(report.is_ok());
    assert!(report.warnings.is_empty());

    let result = workflow.execute(json!("hello")).await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, json!(25));
    assert_eq!(result.completed_jobs, vec!["a", "b", "c"]);
    assert!(result.failed_jobs.is_empty());
    assert!(!result.correlation_id.is_empty());
}

/// A dependency cycle a -> b -> c -> a is rejected before any job runs,
/// with every member named in the cycle path
#[tokio::test]
async fn cycle_rejected_with_full_path() {
    let ran = Arc::new(AtomicUsize::new(0));

    struct Counting {
        ran: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Worker for Counting {
        async fn process(&self, work: Work) -> WorkResult {
            self.ran.fetch_add(1, Ordering::SeqCst);
            WorkResult::success(work, json!(null))
        }
    }

    let factory = |ran: Arc<AtomicUsize>| -> Arc<dyn WorkerFactory> {
        Arc::new(SharedWorkerFactory::new("counting", Arc::new(Counting { ran })))
    };

    let workflow = Workflow::builder("cyclic")
        .add_job(Job::new("a", factory(ran.clone())).depends_on(["c"]))
        .add_job(Job::new("b", factory(ran.clone())).depends_on(["a"]))
        .add_job(Job::new("c", factory(ran.clone())).depends_on(["b"]))
        .build();

    let error = workflow.execute(json!(1)).await.unwrap_err();
    let WorkflowError::Validation { errors, .. } = error else {
        panic!("expected a validation error");
    };
    let cycle = errors.iter().find(|e| e.contains("cycle")).unwrap();
    for name in ["a", "b", "c"] {
        assert!(cycle.contains(name));
    }

    // Execution never started
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

/// Exponential backoff (initial 1s, multiplier 2, 3 attempts) against a
/// worker that fails twice: 1s before attempt 2, 2s before attempt 3,
/// then success; the DLQ stays untouched
#[tokio::test(start_paused = true)]
async fn retry_backoff_timing() {
    struct FailsTwice {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Worker for FailsTwice {
        async fn process(&self, work: Work) -> WorkResult {
            if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                WorkResult::failure(work, WorkError::Network("not yet".into()))
            } else {
                WorkResult::success(work, json!("finally"))
            }
        }
    }

    let workflow = Workflow::builder("retrying")
        .add_job(
            Job::new(
                "flaky",
                Arc::new(SharedWorkerFactory::new(
                    "flaky",
                    Arc::new(FailsTwice {
                        calls: AtomicUsize::new(0),
                    }),
                )),
            )
            .with_retry(RetryConfig::new(RetryStrategy::Exponential {
                initial_delay: Duration::from_secs(1),
                multiplier: 2.0,
                max_attempts: 3,
                max_delay: None,
                jitter: 0.0,
            })),
        )
        .build();

    let executor = WorkflowExecutor::new(workflow, Config::default());
    let dlq = executor.dead_letter_queue();

    let started = tokio::time::Instant::now();
    let result = executor.execute(json!(null)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, json!("finally"));
    assert_eq!(result.trace.unwrap().job("flaky").unwrap().attempts, 3);
    // Delay before attempt 2 is 1s, before attempt 3 is 2s
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(dlq.is_empty());
}

/// Breaker with threshold 3 and a short timeout: three failures open it,
/// calls fail fast while open, the post-timeout probe window tolerates
/// one failure, and three successes close it again
#[tokio::test]
async fn circuit_breaker_recovery_cycle() {
    let breaker = CircuitBreaker::new(
        "s3",
        CircuitBreakerConfig::default()
            .with_threshold(3)
            .with_timeout(Duration::from_millis(50))
            .with_half_open_calls(3),
    );

    // F, F, F -> open
    breaker.record_failure();
    breaker.record_failure();
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    // Any call before the timeout fails fast
    assert!(breaker.try_acquire().is_err());

    tokio::time::sleep(Duration::from_millis(60)).await;

    // Next call enters half-open; first probe failure is forgiven
    assert!(breaker.try_acquire().is_ok());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // Three successive successes close the breaker
    for _ in 0..3 {
        assert!(breaker.try_acquire().is_ok());
        breaker.record_success();
    }
    assert_eq!(breaker.state(), CircuitState::Closed);

    // A second half-open failure (without the free pass) reopens
    breaker.record_failure();
    breaker.record_failure();
    breaker.record_failure();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(breaker.try_acquire().is_ok());
    breaker.record_failure(); // free
    assert!(breaker.try_acquire().is_ok());
    breaker.record_failure(); // reopens
    assert_eq!(breaker.state(), CircuitState::Open);
}

/// A workflow whose only job always fails: the run raises, the job lands
/// in failed_jobs, and the work item is dead-lettered with provenance
#[tokio::test]
async fn exhausted_failure_reaches_dlq() {
    struct AlwaysFails;

    #[async_trait::async_trait]
    impl Worker for AlwaysFails {
        async fn process(&self, work: Work) -> WorkResult {
            WorkResult::failure(work, WorkError::Network("unreachable".into()))
        }
    }

    let workflow = Workflow::builder("doomed")
        .add_job(
            Job::new(
                "fetch",
                Arc::new(SharedWorkerFactory::new("fetch", Arc::new(AlwaysFails))),
            )
            .with_retry(RetryConfig::new(RetryStrategy::Constant {
                delay: Duration::ZERO,
                max_attempts: 2,
            })),
        )
        .build();

    let executor = WorkflowExecutor::new(workflow, Config::default());
    let dlq = executor.dead_letter_queue();

    let error = executor.execute(json!({"url": "https://example.com"})).await.unwrap_err();
    let WorkflowError::Execution { job, result, .. } = error else {
        panic!("expected an execution error");
    };
    assert_eq!(job, "fetch");
    assert_eq!(result.failed_jobs, vec!["fetch"]);

    assert_eq!(dlq.len(), 1);
    let entry = &dlq.entries()[0];
    assert_eq!(entry.work.input(), &json!({"url": "https://example.com"}));
    assert_eq!(entry.context.get("job").map(String::as_str), Some("fetch"));
    assert_eq!(entry.metadata.get("attempts").map(String::as_str), Some("2"));
}

/// Single job flagged terminates: the executor returns right after it
#[tokio::test]
async fn terminating_job_ends_workflow() {
    let workflow = Workflow::builder("single")
        .add_job(Job::new("only", echo_factory()).terminates_workflow())
        .add_job(Job::new("after", echo_factory()).depends_on(["only"]))
        .build();

    let result = workflow.execute(json!("x")).await.unwrap();
    assert_eq!(result.completed_jobs, vec!["only"]);
    assert_eq!(result.output, json!("x"));
}

/// Workflow input type conformance is checked before execution
#[tokio::test]
async fn input_type_mismatch_blocks_run() {
    let workflow = Workflow::builder("typed-input")
        .add_job(Job::new(
            "length",
            Arc::new(
                SharedWorkerFactory::new("length", Arc::new(Length))
                    .with_input_tag(TypeTag::Text),
            ),
        ))
        .build();

    let error = workflow.execute(json!(42)).await.unwrap_err();
    assert!(matches!(error, WorkflowError::Validation { .. }));

    // A conforming input passes
    let result = workflow.execute(json!("abcd")).await.unwrap();
    assert_eq!(result.output, json!(4));
}
