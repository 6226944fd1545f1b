//! Circuit breaker: a stateful gate that fails fast while an upstream is
//! unhealthy
//!
//! Three states per keyed resource: closed (calls pass), open (calls fail
//! fast until the timeout elapses), half-open (a bounded probe budget
//! decides between closing and reopening). Transitions happen under a
//! per-breaker mutex; state reads are lock-free.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through
    Closed,

    /// Calls fail fast
    Open,

    /// Probing recovery
    HalfOpen,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Fast-fail error raised while a breaker is open
#[derive(Debug, Clone, thiserror::Error)]
#[error("Circuit breaker '{key}' is open")]
pub struct CircuitOpenError {
    /// Breaker key
    pub key: String,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub threshold: u32,

    /// Time the circuit stays open before probing
    pub timeout: Duration,

    /// Probe budget in half-open; this many successes close the circuit
    pub half_open_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout: Duration::from_secs(60),
            half_open_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_half_open_calls(mut self, calls: u32) -> Self {
        self.half_open_calls = calls.max(1);
        self
    }
}

#[derive(Default)]
struct BreakerInner {
    last_failure_time: Option<Instant>,

    /// One failure is forgiven right after entering half-open
    just_transitioned: bool,

    /// Probes currently in flight
    probe_inflight: u32,
}

/// Three-state breaker for one keyed resource
pub struct CircuitBreaker {
    key: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    probe_successes: AtomicU32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            key: key.into(),
            config,
            state: AtomicU8::new(0),
            failure_count: AtomicU32::new(0),
            probe_successes: AtomicU32::new(0),
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lock-free state read
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Lock-free failure-count read
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Gate one call.
    ///
    /// Open circuits fail fast until the timeout elapses, at which point
    /// the next call transitions to half-open and is admitted as a probe.
    /// Half-open admits at most `half_open_calls` concurrent probes.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        if self.state() == CircuitState::Closed {
            return Ok(());
        }

        let mut inner = self.inner.lock().unwrap();
        match self.state() {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed_enough = inner
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.config.timeout)
                    .unwrap_or(true);
                if !elapsed_enough {
                    return Err(CircuitOpenError {
                        key: self.key.clone(),
                    });
                }
                inner.last_failure_time = None;
                inner.just_transitioned = true;
                inner.probe_inflight = 1;
                self.probe_successes.store(0, Ordering::SeqCst);
                self.state
                    .store(CircuitState::HalfOpen as u8, Ordering::SeqCst);
                info!("Circuit breaker '{}' half-open (probing)", self.key);
                Ok(())
            }
            CircuitState::HalfOpen => {
                if inner.probe_inflight >= self.config.half_open_calls {
                    return Err(CircuitOpenError {
                        key: self.key.clone(),
                    });
                }
                inner.probe_inflight += 1;
                Ok(())
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match self.state() {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                inner.probe_inflight = inner.probe_inflight.saturating_sub(1);
                let successes = self.probe_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.half_open_calls {
                    self.close(&mut inner);
                    info!("Circuit breaker '{}' closed (recovered)", self.key);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.threshold {
                    inner.last_failure_time = Some(Instant::now());
                    self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
                    warn!(
                        "Circuit breaker '{}' opened after {} failures",
                        self.key, failures
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.probe_inflight = inner.probe_inflight.saturating_sub(1);
                if inner.just_transitioned {
                    // One free recovery attempt right after transitioning
                    inner.just_transitioned = false;
                } else {
                    inner.last_failure_time = Some(Instant::now());
                    self.probe_successes.store(0, Ordering::SeqCst);
                    self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
                    warn!("Circuit breaker '{}' reopened from half-open", self.key);
                }
            }
            CircuitState::Open => {
                inner.last_failure_time = Some(Instant::now());
            }
        }
    }

    /// Return to the initial closed state regardless of history
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.close(&mut inner);
    }

    fn close(&self, inner: &mut BreakerInner) {
        inner.last_failure_time = None;
        inner.just_transitioned = false;
        inner.probe_inflight = 0;
        self.failure_count.store(0, Ordering::SeqCst);
        self.probe_successes.store(0, Ordering::SeqCst);
        self.state
            .store(CircuitState::Closed as u8, Ordering::SeqCst);
    }

    /// Snapshot of breaker state
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock().unwrap();
        CircuitBreakerStats {
            key: self.key.clone(),
            state: self.state(),
            failure_count: self.failure_count(),
            probe_successes: self.probe_successes.load(Ordering::SeqCst),
            last_failure_age: inner.last_failure_time.map(|t| t.elapsed()),
        }
    }
}

/// Breaker snapshot
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub key: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub probe_successes: u32,
    pub last_failure_age: Option<Duration>,
}

/// Thread-safe mapping of keys to shared breakers.
///
/// Jobs using the same key share one breaker (and one orchestrator).
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    orchestrators: DashMap<String, Arc<CircuitBreakerOrchestrator>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the breaker for a key
    pub fn get_or_create(
        &self,
        key: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, config)))
            .clone()
    }

    /// Fetch or create the orchestrator for a key
    pub fn orchestrator_for(
        &self,
        key: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreakerOrchestrator> {
        self.orchestrators
            .entry(key.to_string())
            .or_insert_with(|| {
                let breaker = self.get_or_create(key, config);
                Arc::new(CircuitBreakerOrchestrator::new(breaker))
            })
            .clone()
    }

    /// Remove one breaker and its orchestrator
    pub fn remove(&self, key: &str) {
        self.breakers.remove(key);
        self.orchestrators.remove(key);
    }

    /// Reset every breaker to closed
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    /// Drop every breaker and orchestrator
    pub fn clear(&self) {
        self.breakers.clear();
        self.orchestrators.clear();
    }

    /// Stats for every registered breaker
    pub fn all_stats(&self) -> HashMap<String, CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

/// Failure returned by [`CircuitBreakerOrchestrator::execute_with_breaker`]
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The call was never made
    Open(CircuitOpenError),

    /// The call ran and failed
    Inner(E),
}

/// Pairs a breaker with job-level counters and logging.
///
/// The single integration point for workflow execution.
pub struct CircuitBreakerOrchestrator {
    breaker: Arc<CircuitBreaker>,
    executions: AtomicU64,
    successes: AtomicU64,
    blocked: AtomicU64,
}

impl CircuitBreakerOrchestrator {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            breaker,
            executions: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run one call through the breaker
    pub async fn execute_with_breaker<F, Fut, T, E>(
        &self,
        job_name: &str,
        call: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if let Err(open) = self.breaker.try_acquire() {
            self.blocked.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Job {} blocked by circuit breaker '{}'",
                job_name,
                self.breaker.key()
            );
            return Err(BreakerError::Open(open));
        }

        self.executions.fetch_add(1, Ordering::Relaxed);
        match call().await {
            Ok(value) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.breaker.record_success();
                Ok(value)
            }
            Err(error) => {
                self.breaker.record_failure();
                Err(BreakerError::Inner(error))
            }
        }
    }

    /// Calls that reached the protected function
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Calls that succeeded
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Calls rejected by the open breaker
    pub fn blocked(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }
}
