//! Long-lived continuous server over a supervisor

use super::{ResultCallback, Supervisor, SupervisorOptions};
use crate::config::Config;
use crate::queue::WorkQueue;
use crate::work::Work;
use crate::worker::WorkerPool;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Thin wrapper turning a [`Supervisor`] into a long-lived server with
/// result and error callbacks and an optional externally owned queue.
pub struct ContinuousServer {
    supervisor: Arc<Supervisor>,
    queue: Arc<WorkQueue>,
    log_guard: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>,
}

impl ContinuousServer {
    /// Create a server. `work_queue` lets callers feed an existing queue;
    /// `log_file` mirrors logs into the given file.
    pub fn new(
        worker_pools: Vec<WorkerPool>,
        work_queue: Option<Arc<WorkQueue>>,
        log_file: Option<PathBuf>,
    ) -> Self {
        Self::with_config(worker_pools, work_queue, log_file, Config::default())
    }

    /// Create a server with explicit configuration
    pub fn with_config(
        worker_pools: Vec<WorkerPool>,
        work_queue: Option<Arc<WorkQueue>>,
        log_file: Option<PathBuf>,
        config: Config,
    ) -> Self {
        let log_guard = log_file.and_then(|path| init_file_logging(&path));

        let queue = work_queue.unwrap_or_else(|| Arc::new(WorkQueue::new()));
        let options = SupervisorOptions {
            continuous_mode: true,
            debug: config.debug,
            enable_performance_monitoring: config.enable_performance_monitoring,
            config,
            ..Default::default()
        };
        let supervisor = Arc::new(Supervisor::with_queue(worker_pools, options, queue.clone()));

        Self {
            supervisor,
            queue,
            log_guard: Mutex::new(log_guard),
        }
    }

    /// Register a success-result callback
    pub fn on_result(&self, callback: ResultCallback) {
        self.supervisor.on_result(callback);
    }

    /// Register an error-result callback
    pub fn on_error(&self, callback: ResultCallback) {
        self.supervisor.on_error(callback);
    }

    /// Enqueue a work item
    pub fn add_work_item(&self, work: Work) {
        self.supervisor.add_work_item(work);
    }

    /// The underlying queue, for external feeders
    pub fn queue(&self) -> Arc<WorkQueue> {
        self.queue.clone()
    }

    /// The underlying supervisor
    pub fn supervisor(&self) -> Arc<Supervisor> {
        self.supervisor.clone()
    }

    /// Run until [`stop`](Self::stop) is invoked or a shutdown signal
    /// arrives
    pub async fn run(&self) -> crate::Result<()> {
        info!("Continuous server starting");
        self.supervisor.run().await
    }

    /// Request shutdown; idempotent
    pub fn stop(&self) {
        self.supervisor.stop();
        self.log_guard.lock().unwrap().take();
    }
}

fn init_file_logging(path: &PathBuf) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let directory = path.parent()?;
    let file_name = path.file_name()?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // A global subscriber may already be installed; in that case the file
    // layer is skipped and the guard keeps nothing alive
    let _ = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{WorkError, WorkResult};
    use crate::worker::{SharedWorkerFactory, Worker};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Doubler;

    #[async_trait::async_trait]
    impl Worker for Doubler {
        async fn process(&self, work: Work) -> WorkResult {
            match work.input().as_i64() {
                Some(5) => {
                    WorkResult::failure(work, WorkError::Other("Cannot process 5".to_string()))
                }
                Some(n) => WorkResult::success(work, json!(n * 2)),
                None => WorkResult::failure(
                    work,
                    WorkError::Validation("expected an integer".to_string()),
                ),
            }
        }
    }

    fn pools() -> Vec<WorkerPool> {
        vec![WorkerPool::with_workers(
            Arc::new(SharedWorkerFactory::new("doubler", Arc::new(Doubler))),
            2,
        )]
    }

    #[tokio::test]
    async fn test_server_round_trip() {
        let server = Arc::new(ContinuousServer::new(pools(), None, None));
        let seen = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        {
            let seen = seen.clone();
            server.on_result(Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
            let errors = errors.clone();
            server.on_error(Arc::new(move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };

        server.add_work_item(Work::new(json!(4)));
        server.add_work_item(Work::new(json!(5)));

        while seen.load(Ordering::SeqCst) + errors.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        server.stop();
        runner.await.unwrap().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_external_queue_feeding() {
        let queue = Arc::new(WorkQueue::new());
        queue.push(Work::new(json!(3)));

        let server = Arc::new(ContinuousServer::new(pools(), Some(queue.clone()), None));
        // Items pushed directly to the external queue are not counted by
        // add_work_item, so feed through the server for accounting
        server.add_work_item(Work::new(json!(6)));

        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };

        let supervisor = server.supervisor();
        while supervisor.results().total() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        server.stop();
        runner.await.unwrap().unwrap();
        assert!(supervisor.results().success_count() >= 1);
    }
}
