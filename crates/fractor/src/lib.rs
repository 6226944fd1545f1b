//! Fractor: fault-tolerant parallel work execution
//!
//! Two composed layers:
//!
//! - **Supervisor core**: pools of isolated worker actors consume work
//!   items from a queue over channels; a single dispatcher routes
//!   results to an aggregator, callbacks, and the error reporter, in
//!   bounded batch or long-lived continuous mode.
//! - **Workflow core**: a DAG of named jobs orchestrated above the
//!   supervisor, with per-job retry, circuit breaking, fallback,
//!   conditional execution, and a dead-letter queue for exhausted
//!   failures.
//!
//! ```no_run
//! use fractor::{Supervisor, SupervisorOptions, Work, WorkerPool, SharedWorkerFactory};
//! # use fractor::{Worker, WorkResult};
//! # use std::sync::Arc;
//! # struct Doubler;
//! # #[async_trait::async_trait]
//! # impl Worker for Doubler {
//! #     async fn process(&self, work: Work) -> WorkResult {
//! #         let n = work.input().as_i64().unwrap_or(0);
//! #         WorkResult::success(work, serde_json::json!(n * 2))
//! #     }
//! # }
//! # async fn run() -> fractor::Result<()> {
//! let pool = WorkerPool::with_workers(
//!     Arc::new(SharedWorkerFactory::new("doubler", Arc::new(Doubler))),
//!     2,
//! );
//! let supervisor = Supervisor::new(vec![pool], SupervisorOptions::default());
//! supervisor.add_work_items((1..=5).map(|n| Work::new(serde_json::json!(n))).collect());
//! supervisor.run().await?;
//! println!("{} results", supervisor.results().success_count());
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod circuit_breaker;
pub mod config;
pub mod dead_letter;
pub mod distributor;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod result;
pub mod retry;
pub mod supervisor;
pub mod work;
pub mod worker;
pub mod workflow;

// Re-export commonly used types
pub use actor::{ActorState, Envelope, WireProtocol, WorkerActor};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerOrchestrator, CircuitBreakerRegistry,
    CircuitOpenError, CircuitState,
};
pub use config::{init_logging, Config};
pub use dead_letter::{DeadLetterQueue, DlqEntry};
pub use distributor::WorkDistributor;
pub use error::{Error, Result};
pub use metrics::MetricsSnapshot;
pub use queue::{
    JsonPersister, PersistentWorkQueue, Persister, PriorityWorkQueue, QueueError, WorkQueue,
};
pub use result::{ErrorCategory, ErrorInfo, ErrorSeverity, WorkError, WorkResult};
pub use retry::{RetryConfig, RetryOrchestrator, RetryState, RetryStrategy};
pub use supervisor::{
    ContinuousServer, ErrorReporter, PerformanceMetrics, PerformanceMonitor, ResultAggregator,
    Supervisor, SupervisorOptions,
};
pub use work::{Priority, PriorityWork, Work};
pub use worker::{SharedWorkerFactory, TypeTag, Worker, WorkerFactory, WorkerPool};
pub use workflow::{
    ChainBuilder, ExecutionStrategy, Job, JobState, Workflow, WorkflowBuilder, WorkflowContext,
    WorkflowError, WorkflowExecutor, WorkflowHooks, WorkflowResult,
};

/// Current version of fractor
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
