//! Worker actors: isolated execution contexts for workers
//!
//! Each actor owns one worker instance and runs as its own task with no
//! shared mutable state. Work arrives over a message channel; results
//! leave as envelopes, either through the shared take-channel (the
//! "shared" wire protocol, which also announces readiness with an
//! `Initialize` envelope) or through a caller-supplied response port per
//! message (the "ports" protocol).

use crate::result::{WorkError, WorkResult};
use crate::work::Work;
use crate::worker::Worker;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Actor lifecycle states (one-way: unstarted -> running -> closed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Unstarted = 0,
    Running = 1,
    Closed = 2,
}

impl ActorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ActorState::Running,
            2 => ActorState::Closed,
            _ => ActorState::Unstarted,
        }
    }
}

/// Wire protocol between actors and their supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProtocol {
    /// All envelopes flow through one shared take-channel; the actor
    /// emits `Initialize` on startup
    Shared,

    /// Each work message carries its own response port; no `Initialize`
    Ports,
}

/// Messages accepted by an actor
pub enum ActorMessage {
    /// Process a work item, responding on the shared channel
    Work(Work),

    /// Process a work item, responding on the supplied port
    WorkWithPort(Work, mpsc::UnboundedSender<Envelope>),

    /// Terminate the actor
    Shutdown,
}

/// Envelopes emitted by an actor
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Emitted on startup by the shared protocol only
    Initialize { processor: String },

    /// Successful work result
    Result {
        result: WorkResult,
        processor: String,
    },

    /// Failed work result
    Error {
        result: WorkResult,
        processor: String,
    },

    /// Orderly termination
    Shutdown { processor: String },
}

impl Envelope {
    /// Name of the emitting actor
    pub fn processor(&self) -> &str {
        match self {
            Envelope::Initialize { processor }
            | Envelope::Result { processor, .. }
            | Envelope::Error { processor, .. }
            | Envelope::Shutdown { processor } => processor,
        }
    }
}

/// Isolated execution context hosting one worker.
///
/// State machine: unstarted -> running -> closed, one-way.
pub struct WorkerActor {
    name: String,
    worker: Arc<dyn Worker>,
    protocol: WireProtocol,
    events: mpsc::UnboundedSender<Envelope>,
    tx: mpsc::UnboundedSender<ActorMessage>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<ActorMessage>>>,
    state: Arc<AtomicU8>,
    class_timeout: Option<Duration>,
    fallback_timeout: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerActor {
    /// Create an actor.
    ///
    /// `events` is the shared take-channel; the ports protocol still uses
    /// it for `Shutdown` envelopes. `fallback_timeout` applies when
    /// neither the work item nor the worker declares one.
    pub fn new(
        name: impl Into<String>,
        worker: Arc<dyn Worker>,
        events: mpsc::UnboundedSender<Envelope>,
        protocol: WireProtocol,
        class_timeout: Option<Duration>,
        fallback_timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            worker,
            protocol,
            events,
            tx,
            rx: Mutex::new(Some(rx)),
            state: Arc::new(AtomicU8::new(ActorState::Unstarted as u8)),
            class_timeout,
            fallback_timeout,
            handle: Mutex::new(None),
        }
    }

    /// Actor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire protocol in use
    pub fn protocol(&self) -> WireProtocol {
        self.protocol
    }

    /// Current lifecycle state
    pub fn state(&self) -> ActorState {
        ActorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True after termination or before start
    pub fn is_closed(&self) -> bool {
        self.state() != ActorState::Running
    }

    /// Spawn the execution context and enter the receive loop
    pub fn start(&self) -> crate::Result<()> {
        let mut rx_guard = self.rx.lock().unwrap();
        let rx = rx_guard
            .take()
            .ok_or_else(|| crate::Error::actor(format!("actor '{}' already started", self.name)))?;

        self.state.store(ActorState::Running as u8, Ordering::SeqCst);

        let name = self.name.clone();
        let worker = self.worker.clone();
        let events = self.events.clone();
        let state = self.state.clone();
        let effective_class_timeout = self.worker.timeout().or(self.class_timeout);
        let fallback_timeout = self.fallback_timeout;
        let protocol = self.protocol;

        let handle = tokio::spawn(async move {
            run_actor(
                name,
                worker,
                rx,
                events,
                state,
                protocol,
                effective_class_timeout,
                fallback_timeout,
            )
            .await;
        });
        *self.handle.lock().unwrap() = Some(handle);

        debug!("Started actor: name={}", self.name);
        Ok(())
    }

    /// Enqueue a message; non-blocking, returns whether it was accepted
    pub fn send(&self, message: ActorMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(message).is_ok()
    }

    /// Send a work item using the actor's wire protocol
    pub fn dispatch(&self, work: Work) -> bool {
        let message = match self.protocol {
            WireProtocol::Shared => ActorMessage::Work(work),
            WireProtocol::Ports => ActorMessage::WorkWithPort(work, self.events.clone()),
        };
        self.send(message)
    }

    /// Request termination; idempotent
    pub fn close(&self) {
        if self.state() == ActorState::Running {
            let _ = self.tx.send(ActorMessage::Shutdown);
        }
    }

    /// Abort the actor task without waiting for an orderly shutdown
    pub fn kill(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
        self.state.store(ActorState::Closed as u8, Ordering::SeqCst);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_actor(
    name: String,
    worker: Arc<dyn Worker>,
    mut rx: mpsc::UnboundedReceiver<ActorMessage>,
    events: mpsc::UnboundedSender<Envelope>,
    state: Arc<AtomicU8>,
    protocol: WireProtocol,
    class_timeout: Option<Duration>,
    fallback_timeout: Duration,
) {
    if protocol == WireProtocol::Shared {
        let _ = events.send(Envelope::Initialize {
            processor: name.clone(),
        });
    }

    while let Some(message) = rx.recv().await {
        match message {
            ActorMessage::Work(work) => {
                let envelope =
                    process_work(&name, worker.as_ref(), work, class_timeout, fallback_timeout)
                        .await;
                if events.send(envelope).is_err() {
                    warn!("Actor {} lost its take-channel; shutting down", name);
                    break;
                }
            }
            ActorMessage::WorkWithPort(work, port) => {
                let envelope =
                    process_work(&name, worker.as_ref(), work, class_timeout, fallback_timeout)
                        .await;
                if port.send(envelope).is_err() {
                    warn!("Actor {} lost its response port; shutting down", name);
                    break;
                }
            }
            ActorMessage::Shutdown => {
                info!("Actor {} received shutdown", name);
                break;
            }
        }
    }

    state.store(ActorState::Closed as u8, Ordering::SeqCst);
    let _ = events.send(Envelope::Shutdown { processor: name });
}

/// Run one work item through the worker, enforcing the effective timeout
/// and containing panics. The actor never dies to user-code failures.
async fn process_work(
    name: &str,
    worker: &dyn Worker,
    work: Work,
    class_timeout: Option<Duration>,
    fallback_timeout: Duration,
) -> Envelope {
    let effective = work
        .timeout()
        .or(class_timeout)
        .unwrap_or(fallback_timeout);

    let fut = AssertUnwindSafe(worker.process(work.clone())).catch_unwind();
    let result = match tokio::time::timeout(effective, fut).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => {
            let message = panic_message(&panic);
            error!("Actor {} worker panicked: {}", name, message);
            WorkResult::failure(work, WorkError::Other(message))
        }
        Err(_) => {
            warn!(
                "Actor {} work timed out after {:?}",
                name, effective
            );
            WorkResult::failure(work, WorkError::timeout(effective))
        }
    };

    let processor = name.to_string();
    if result.is_success() {
        Envelope::Result { result, processor }
    } else {
        Envelope::Error { result, processor }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
