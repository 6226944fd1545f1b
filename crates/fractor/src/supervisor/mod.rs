//! Supervisor: actor pool lifecycle, dispatch loop, and result routing
//!
//! The supervisor owns the actor pools and a single-threaded dispatch
//! loop multiplexing over the actors' envelope channel. Work items flow
//! queue -> idle actor -> result envelope -> aggregator/callbacks. It
//! runs in bounded batch mode (terminate when every added item has a
//! result and the queue is empty) or continuous mode (run until `stop`).

pub mod aggregator;
pub mod monitor;
pub mod reporter;
pub mod server;
pub mod signal;

pub use aggregator::ResultAggregator;
pub use monitor::{PerformanceMetrics, PerformanceMonitor};
pub use reporter::{ErrorReporter, ErrorStats};
pub use server::ContinuousServer;
pub use signal::SignalHandler;

use crate::actor::{ActorState, Envelope, WireProtocol, WorkerActor};
use crate::config::Config;
use crate::distributor::{ActorRoster, WorkDistributor};
use crate::queue::WorkQueue;
use crate::result::WorkResult;
use crate::work::Work;
use crate::worker::WorkerPool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often the continuous-mode ticker polls work callbacks
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Deadline for the ticker to finish before it is force-killed
const TICKER_JOIN_DEADLINE: Duration = Duration::from_secs(1);

/// Deadline for actors to acknowledge shutdown before being killed
const ACTOR_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Result callback signature
pub type ResultCallback = Arc<dyn Fn(&WorkResult) + Send + Sync>;

/// Work-pull callback signature (continuous mode)
pub type WorkCallback = Arc<dyn Fn() -> Vec<Work> + Send + Sync>;

/// Supervisor construction options
#[derive(Clone)]
pub struct SupervisorOptions {
    /// Run until `stop` instead of until the batch drains
    pub continuous_mode: bool,

    /// Verbose envelope logging
    pub debug: bool,

    /// Collect latency and resource metrics
    pub enable_performance_monitoring: bool,

    /// Actor wire protocol
    pub wire_protocol: WireProtocol,

    /// Ambient configuration
    pub config: Config,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            continuous_mode: false,
            debug: false,
            enable_performance_monitoring: false,
            wire_protocol: WireProtocol::Shared,
            config: Config::default(),
        }
    }
}

/// Dispatcher owning actor pools and routing work and results
pub struct Supervisor {
    pools: Vec<WorkerPool>,
    options: SupervisorOptions,
    queue: Arc<WorkQueue>,
    roster: ActorRoster,
    actor_labels: Mutex<HashMap<String, String>>,
    active: Mutex<HashSet<String>>,
    distributor: WorkDistributor,
    aggregator: Arc<ResultAggregator>,
    reporter: Arc<ErrorReporter>,
    monitor: Option<Arc<PerformanceMonitor>>,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    wakeup_tx: mpsc::UnboundedSender<()>,
    wakeup_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    on_result: Mutex<Vec<ResultCallback>>,
    on_error: Mutex<Vec<ResultCallback>>,
    work_callbacks: Mutex<Vec<WorkCallback>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    signal_handler: Mutex<Option<SignalHandler>>,
    total_added: AtomicUsize,
    running: AtomicBool,
    stop_requested: Arc<AtomicBool>,
    debug_enabled: AtomicBool,
}

impl Supervisor {
    /// Create a supervisor with its own FIFO queue
    pub fn new(pools: Vec<WorkerPool>, options: SupervisorOptions) -> Self {
        Self::with_queue(pools, options, Arc::new(WorkQueue::new()))
    }

    /// Create a supervisor consuming an externally owned queue
    pub fn with_queue(
        pools: Vec<WorkerPool>,
        options: SupervisorOptions,
        queue: Arc<WorkQueue>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (wakeup_tx, wakeup_rx) = mpsc::unbounded_channel();
        let roster: ActorRoster = Arc::new(RwLock::new(Vec::new()));
        let monitor = options
            .enable_performance_monitoring
            .then(|| Arc::new(PerformanceMonitor::new()));
        let distributor = WorkDistributor::new(queue.clone(), roster.clone(), monitor.clone());
        let debug = options.debug;

        Self {
            pools,
            options,
            queue,
            roster,
            actor_labels: Mutex::new(HashMap::new()),
            active: Mutex::new(HashSet::new()),
            distributor,
            aggregator: Arc::new(ResultAggregator::new()),
            reporter: Arc::new(ErrorReporter::new()),
            monitor,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            wakeup_tx,
            wakeup_rx: Mutex::new(Some(wakeup_rx)),
            on_result: Mutex::new(Vec::new()),
            on_error: Mutex::new(Vec::new()),
            work_callbacks: Mutex::new(Vec::new()),
            ticker: Mutex::new(None),
            signal_handler: Mutex::new(None),
            total_added: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            stop_requested: Arc::new(AtomicBool::new(false)),
            debug_enabled: AtomicBool::new(debug),
        }
    }

    /// Enqueue one work item
    pub fn add_work_item(&self, work: Work) {
        self.queue.push(work);
        self.total_added.fetch_add(1, Ordering::SeqCst);
        self.wake();
    }

    /// Enqueue many work items. An empty list is a no-op.
    pub fn add_work_items(&self, works: Vec<Work>) {
        if works.is_empty() {
            return;
        }
        self.total_added.fetch_add(works.len(), Ordering::SeqCst);
        self.queue.push_all(works);
        self.wake();
    }

    /// Register a success-result callback
    pub fn on_result(&self, callback: ResultCallback) {
        self.on_result.lock().unwrap().push(callback);
    }

    /// Register an error-result callback
    pub fn on_error(&self, callback: ResultCallback) {
        self.on_error.lock().unwrap().push(callback);
    }

    /// Register a work-pull callback, polled periodically in continuous
    /// mode
    pub fn on_work_needed(&self, callback: WorkCallback) {
        self.work_callbacks.lock().unwrap().push(callback);
    }

    /// The result aggregator
    pub fn results(&self) -> Arc<ResultAggregator> {
        self.aggregator.clone()
    }

    /// The error reporter
    pub fn error_reporter(&self) -> Arc<ErrorReporter> {
        self.reporter.clone()
    }

    /// Enable verbose envelope logging
    pub fn debug_on(&self) {
        self.debug_enabled.store(true, Ordering::SeqCst);
    }

    /// Disable verbose envelope logging
    pub fn debug_off(&self) {
        self.debug_enabled.store(false, Ordering::SeqCst);
    }

    /// Request shutdown; idempotent and safe from any task
    pub fn stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            info!("Supervisor stop requested");
        }
        self.wake();
    }

    /// Whether the dispatch loop is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the dispatch loop to completion.
    ///
    /// Batch mode returns once every added item has produced a result and
    /// the queue is empty; continuous mode returns after `stop`.
    pub async fn run(&self) -> crate::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(crate::Error::supervisor("supervisor already running"));
        }

        let channels = (
            self.events_rx.lock().unwrap().take(),
            self.wakeup_rx.lock().unwrap().take(),
        );
        let (Some(mut events_rx), Some(mut wakeup_rx)) = channels else {
            self.running.store(false, Ordering::SeqCst);
            return Err(crate::Error::supervisor("supervisor cannot be re-run"));
        };

        if let Err(e) = self.start_actors() {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        if self.options.continuous_mode {
            self.start_ticker();
            self.install_signal_handler();
        }

        // Ports-protocol actors never announce readiness, so seed the
        // idle set and distribute up front
        if self.options.wire_protocol == WireProtocol::Ports {
            for actor in self.roster.read().unwrap().iter() {
                self.distributor.mark_worker_idle(actor.name());
            }
            self.distributor.distribute_to_idle_workers();
        }

        info!(
            "Supervisor running: {} pools, continuous={}",
            self.pools.len(),
            self.options.continuous_mode
        );

        loop {
            if self.batch_complete() || self.stop_requested.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                maybe_envelope = events_rx.recv() => {
                    match maybe_envelope {
                        Some(envelope) => self.handle_envelope(envelope),
                        None => break,
                    }
                }
                _ = wakeup_rx.recv() => {
                    if self.stop_requested.load(Ordering::SeqCst) {
                        break;
                    }
                    self.pull_work_callbacks();
                    self.distributor.distribute_to_idle_workers();
                }
            }
        }

        self.shutdown(&mut events_rx).await;
        self.running.store(false, Ordering::SeqCst);
        info!(
            "Supervisor finished: {} results, {} errors",
            self.aggregator.success_count(),
            self.aggregator.error_count()
        );
        Ok(())
    }

    /// Queue size plus a summary of each pending item
    pub fn inspect_queue(&self) -> QueueInspection {
        let items = self
            .queue
            .snapshot()
            .iter()
            .map(|work| WorkItemSummary {
                class: "work".to_string(),
                input: work.summary(),
                pretty: serde_json::to_string_pretty(work.input())
                    .unwrap_or_else(|_| work.summary()),
            })
            .collect::<Vec<_>>();
        QueueInspection {
            size: items.len(),
            items,
        }
    }

    /// Worker totals and per-pool actor listing
    pub fn workers_status(&self) -> WorkersStatus {
        let roster = self.roster.read().unwrap();
        let labels = self.actor_labels.lock().unwrap();

        let mut pools: Vec<PoolStatus> = self
            .pools
            .iter()
            .map(|pool| PoolStatus {
                worker: pool.factory.worker_name().to_string(),
                num_workers: 0,
                actors: Vec::new(),
            })
            .collect();

        for actor in roster.iter() {
            let label = labels.get(actor.name()).cloned().unwrap_or_default();
            if let Some(pool) = pools.iter_mut().find(|p| p.worker == label) {
                pool.num_workers += 1;
                pool.actors.push(ActorStatus {
                    name: actor.name().to_string(),
                    state: actor.state(),
                });
            }
        }

        WorkersStatus {
            total: roster.len(),
            idle: self.distributor.idle_count(),
            busy: self.distributor.busy_count(),
            pools,
        }
    }

    /// Performance snapshot when monitoring is enabled
    pub fn performance_metrics(&self) -> Option<PerformanceMetrics> {
        let monitor = self.monitor.as_ref()?;
        let total = self.roster.read().unwrap().len();
        Some(monitor.snapshot(total, self.distributor.busy_count()))
    }

    /// Exportable metrics assembled from the error reporter and the
    /// performance monitor
    pub fn metrics_snapshot(&self) -> crate::metrics::MetricsSnapshot {
        let stats = self.reporter.stats();
        let performance = self.performance_metrics();
        crate::metrics::MetricsSnapshot::assemble(&stats, performance.as_ref())
    }

    fn wake(&self) {
        let _ = self.wakeup_tx.send(());
    }

    fn batch_complete(&self) -> bool {
        !self.options.continuous_mode
            && self.aggregator.total() >= self.total_added.load(Ordering::SeqCst)
            && self.queue.is_empty()
    }

    /// Instantiate and start every pool's actors under unique names
    fn start_actors(&self) -> crate::Result<()> {
        let fallback_timeout = self.options.config.worker_timeout();
        let mut roster = self.roster.write().unwrap();
        let mut labels = self.actor_labels.lock().unwrap();
        let mut active = self.active.lock().unwrap();

        for pool in &self.pools {
            let count = pool
                .num_workers
                .unwrap_or_else(|| self.options.config.resolved_pool_size());
            let label = pool.factory.worker_name().to_string();

            for index in 0..count {
                let name = format!("{}-{}", label, index);
                let actor = Arc::new(WorkerActor::new(
                    name.clone(),
                    pool.factory.create(),
                    self.events_tx.clone(),
                    self.options.wire_protocol,
                    pool.factory.default_timeout(),
                    fallback_timeout,
                ));
                actor.start()?;
                labels.insert(name.clone(), label.clone());
                active.insert(name);
                roster.push(actor);
            }
        }

        info!("Started {} actors across {} pools", roster.len(), self.pools.len());
        Ok(())
    }

    fn start_ticker(&self) {
        let wakeup = self.wakeup_tx.clone();
        let stop = self.stop_requested.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                if wakeup.send(()).is_err() {
                    break;
                }
            }
        });
        *self.ticker.lock().unwrap() = Some(handle);
    }

    fn install_signal_handler(&self) {
        let stop = self.stop_requested.clone();
        let wakeup = self.wakeup_tx.clone();
        let handler = SignalHandler::start(move || {
            let stop = stop.clone();
            let wakeup = wakeup.clone();
            async move {
                stop.store(true, Ordering::SeqCst);
                let _ = wakeup.send(());
            }
        });
        *self.signal_handler.lock().unwrap() = Some(handler);
    }

    /// Poll registered work callbacks for new items
    fn pull_work_callbacks(&self) {
        if !self.options.continuous_mode {
            return;
        }
        let callbacks: Vec<WorkCallback> = self.work_callbacks.lock().unwrap().clone();
        for callback in callbacks {
            let works = callback();
            if !works.is_empty() {
                debug!("Work callback produced {} items", works.len());
                self.total_added.fetch_add(works.len(), Ordering::SeqCst);
                self.queue.push_all(works);
            }
        }
    }

    fn find_actor(&self, name: &str) -> Option<Arc<WorkerActor>> {
        self.roster
            .read()
            .unwrap()
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Process exactly one envelope
    fn handle_envelope(&self, envelope: Envelope) {
        if self.debug_enabled.load(Ordering::SeqCst) {
            debug!("Envelope from {}: {:?}", envelope.processor(), envelope);
        }

        match envelope {
            Envelope::Initialize { processor } => {
                if let Some(actor) = self.find_actor(&processor) {
                    if !self.distributor.assign_work_to_worker(&actor) {
                        self.distributor.mark_worker_idle(&processor);
                    }
                }
            }
            Envelope::Result { result, processor } => {
                if let Some(monitor) = &self.monitor {
                    monitor.record_completion(&processor, true);
                }
                if self.options.config.enable_error_reporting {
                    self.reporter.record_success();
                }
                for callback in self.on_result.lock().unwrap().iter() {
                    callback(&result);
                }
                self.aggregator.record(result);
                self.reassign(&processor);
            }
            Envelope::Error { result, processor } => {
                if let Some(monitor) = &self.monitor {
                    monitor.record_completion(&processor, false);
                }
                if self.options.config.enable_error_reporting {
                    if let Some(info) = result.error() {
                        let labels = self.actor_labels.lock().unwrap();
                        let label = labels
                            .get(&processor)
                            .cloned()
                            .unwrap_or_else(|| processor.clone());
                        drop(labels);
                        self.reporter.record_error(&label, info);
                    }
                }
                for callback in self.on_error.lock().unwrap().iter() {
                    callback(&result);
                }
                self.aggregator.record(result);
                self.reassign(&processor);
            }
            Envelope::Shutdown { processor } => {
                self.active.lock().unwrap().remove(&processor);
                self.distributor.mark_worker_busy(&processor);
                debug!("Actor {} shut down", processor);
            }
        }
    }

    /// Hand the next queued item to the actor that just finished, or mark
    /// it idle when nothing is pending
    fn reassign(&self, processor: &str) {
        match self.find_actor(processor) {
            Some(actor) => {
                if !self.distributor.assign_work_to_worker(&actor) {
                    self.distributor.mark_worker_idle(processor);
                }
            }
            None => self.distributor.mark_worker_idle(processor),
        }
    }

    /// Orderly shutdown: stop the ticker, wake the loop channel, send
    /// shutdown to every actor, then wait for their shutdown envelopes
    async fn shutdown(&self, events_rx: &mut mpsc::UnboundedReceiver<Envelope>) {
        if let Some(mut handler) = self.signal_handler.lock().unwrap().take() {
            handler.stop();
        }

        let ticker = self.ticker.lock().unwrap().take();
        if let Some(mut handle) = ticker {
            if tokio::time::timeout(TICKER_JOIN_DEADLINE, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }

        let _ = self.wakeup_tx.send(());

        let actors: Vec<Arc<WorkerActor>> = self.roster.read().unwrap().clone();
        for actor in &actors {
            actor.close();
        }

        let deadline = tokio::time::Instant::now() + ACTOR_SHUTDOWN_DEADLINE;
        while !self.active.lock().unwrap().is_empty() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, events_rx.recv()).await {
                Ok(Some(envelope)) => self.handle_envelope(envelope),
                Ok(None) => break,
                Err(_) => break,
            }
        }

        // Anything still alive gets killed outright
        let stragglers: Vec<String> = self.active.lock().unwrap().iter().cloned().collect();
        for name in stragglers {
            if let Some(actor) = self.find_actor(&name) {
                if actor.state() != ActorState::Closed {
                    warn!("Actor {} did not shut down in time; killing", name);
                    actor.kill();
                }
            }
            self.active.lock().unwrap().remove(&name);
        }
    }
}

/// Snapshot of the pending queue for debugging
#[derive(Debug, Clone)]
pub struct QueueInspection {
    /// Pending item count
    pub size: usize,

    /// Per-item summaries
    pub items: Vec<WorkItemSummary>,
}

/// One pending work item, summarized
#[derive(Debug, Clone)]
pub struct WorkItemSummary {
    /// Work class tag
    pub class: String,

    /// Truncated input rendering
    pub input: String,

    /// Pretty-printed input
    pub pretty: String,
}

/// Worker pool status snapshot
#[derive(Debug, Clone)]
pub struct WorkersStatus {
    pub total: usize,
    pub idle: usize,
    pub busy: usize,
    pub pools: Vec<PoolStatus>,
}

/// Status of one pool
#[derive(Debug, Clone)]
pub struct PoolStatus {
    /// Worker class name
    pub worker: String,

    /// Actors hosting this worker
    pub num_workers: usize,

    pub actors: Vec<ActorStatus>,
}

/// Status of one actor
#[derive(Debug, Clone)]
pub struct ActorStatus {
    pub name: String,
    pub state: ActorState,
}
