//! Retry strategies and the attempt-loop orchestrator

use crate::dead_letter::{DeadLetterQueue, DlqEntry};
use crate::result::{ErrorCategory, ErrorInfo};
use crate::work::Work;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay strategy across retry attempts.
///
/// All strategies return zero delay before the first attempt and cap
/// computed delays at `max_delay` when one is set.
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// `initial_delay * multiplier^(n-2)` before attempt `n >= 2`
    Exponential {
        initial_delay: Duration,
        multiplier: f64,
        max_attempts: u32,
        max_delay: Option<Duration>,
        /// Randomization factor (0.0 - 1.0); zero keeps delays exact
        jitter: f64,
    },

    /// `initial_delay + increment * (n-2)` before attempt `n >= 2`
    Linear {
        initial_delay: Duration,
        increment: Duration,
        max_attempts: u32,
        max_delay: Option<Duration>,
    },

    /// Fixed delay before every attempt after the first
    Constant { delay: Duration, max_attempts: u32 },

    /// Single attempt, no delays
    NoRetry,
}

impl RetryStrategy {
    /// Conventional exponential backoff (multiplier 2, no jitter)
    pub fn exponential(initial_delay: Duration, max_attempts: u32) -> Self {
        RetryStrategy::Exponential {
            initial_delay,
            multiplier: 2.0,
            max_attempts,
            max_delay: None,
            jitter: 0.0,
        }
    }

    /// Maximum attempts for this strategy
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryStrategy::Exponential { max_attempts, .. }
            | RetryStrategy::Linear { max_attempts, .. }
            | RetryStrategy::Constant { max_attempts, .. } => (*max_attempts).max(1),
            RetryStrategy::NoRetry => 1,
        }
    }

    /// Delay before the given 1-based attempt.
    ///
    /// `delay_for(1)` is always zero: the first attempt never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        match self {
            RetryStrategy::Exponential {
                initial_delay,
                multiplier,
                max_delay,
                jitter,
                ..
            } => {
                let exponent = (attempt - 2) as f64;
                let mut secs = initial_delay.as_secs_f64() * multiplier.powf(exponent);
                if let Some(cap) = max_delay {
                    secs = secs.min(cap.as_secs_f64());
                }
                if *jitter > 0.0 {
                    use rand::Rng;
                    let spread = secs * jitter;
                    let offset = rand::thread_rng().gen_range(-spread..=spread);
                    secs = (secs + offset).max(0.0);
                }
                Duration::from_secs_f64(secs)
            }
            RetryStrategy::Linear {
                initial_delay,
                increment,
                max_delay,
                ..
            } => {
                let delay = *initial_delay + *increment * (attempt - 2);
                match max_delay {
                    Some(cap) => delay.min(*cap),
                    None => delay,
                }
            }
            RetryStrategy::Constant { delay, .. } => *delay,
            RetryStrategy::NoRetry => Duration::ZERO,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::exponential(Duration::from_secs(1), 3)
    }
}

/// Retry configuration for a job
#[derive(Debug, Clone, Default)]
pub struct RetryConfig {
    /// Delay strategy
    pub strategy: RetryStrategy,

    /// Overall deadline across all attempts
    pub timeout: Option<Duration>,

    /// Categories worth retrying; empty retries everything
    pub retryable_categories: Vec<ErrorCategory>,

    /// Error codes worth retrying, in addition to the categories
    pub retryable_codes: Vec<String>,
}

impl RetryConfig {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            timeout: None,
            retryable_categories: Vec::new(),
            retryable_codes: Vec::new(),
        }
    }

    /// Restrict retries to the given categories
    pub fn with_retryable_categories(mut self, categories: Vec<ErrorCategory>) -> Self {
        self.retryable_categories = categories;
        self
    }

    /// Also retry the given error codes
    pub fn with_retryable_codes(mut self, codes: Vec<String>) -> Self {
        self.retryable_codes = codes;
        self
    }

    /// Set an overall deadline across attempts
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether the given error should be retried
    pub fn is_retryable(&self, error: &ErrorInfo) -> bool {
        if self.retryable_categories.is_empty() && self.retryable_codes.is_empty() {
            return true;
        }
        if self.retryable_categories.contains(&error.category) {
            return true;
        }
        match &error.code {
            Some(code) => self.retryable_codes.iter().any(|c| c == code),
            None => false,
        }
    }
}

/// State of one retry loop
#[derive(Debug, Clone)]
pub struct RetryState {
    /// 1-based attempt counter
    pub attempt: u32,

    /// Errors observed so far, in attempt order
    pub errors: Vec<ErrorInfo>,

    /// When the loop started
    pub started_at: DateTime<Utc>,
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Whether the allowed attempts are used up
    pub fn exhausted(&self, max_attempts: u32) -> bool {
        self.attempt > max_attempts
    }

    fn record(&mut self, error: ErrorInfo) {
        self.errors.push(error);
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// A job failure carried through the retry loop: the error plus the work
/// item for dead-letter insertion
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub error: ErrorInfo,
    pub work: Option<Work>,
}

impl AttemptFailure {
    pub fn new(error: ErrorInfo) -> Self {
        Self { error, work: None }
    }

    pub fn with_work(error: ErrorInfo, work: Work) -> Self {
        Self {
            error,
            work: Some(work),
        }
    }
}

/// Runs the attempt loop for one job: classify, delay, re-invoke, and on
/// exhaustion hand the failure to the dead-letter queue.
pub struct RetryOrchestrator {
    config: RetryConfig,
    dlq: Option<Arc<DeadLetterQueue>>,
}

impl RetryOrchestrator {
    pub fn new(config: RetryConfig, dlq: Option<Arc<DeadLetterQueue>>) -> Self {
        Self { config, dlq }
    }

    /// Run `attempt_fn` until it succeeds, a non-retryable error occurs,
    /// or attempts are exhausted.
    ///
    /// The final state is returned alongside the failure so callers can
    /// surface the attempt history.
    pub async fn execute_with_retry<F, Fut, T>(
        &self,
        job_name: &str,
        mut attempt_fn: F,
    ) -> Result<T, (AttemptFailure, RetryState)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let max_attempts = self.config.strategy.max_attempts();
        let mut state = RetryState::new();

        loop {
            state.attempt += 1;
            let attempt = state.attempt;

            match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Job {} succeeded on attempt {}", job_name, attempt);
                    }
                    return Ok(value);
                }
                Err(failure) => {
                    state.record(failure.error.clone());
                    warn!(
                        "Job {} attempt {}/{} failed: {}",
                        job_name, attempt, max_attempts, failure.error
                    );

                    if !self.config.is_retryable(&failure.error) {
                        debug!(
                            "Job {} error not retryable (category={})",
                            job_name, failure.error.category
                        );
                        return Err((failure, state));
                    }

                    if attempt >= max_attempts {
                        self.add_to_dlq(job_name, &failure, &state);
                        return Err((failure, state));
                    }

                    if let Some(deadline) = self.config.timeout {
                        let elapsed = (Utc::now() - state.started_at)
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        if elapsed >= deadline {
                            warn!("Job {} retry deadline exceeded", job_name);
                            self.add_to_dlq(job_name, &failure, &state);
                            return Err((failure, state));
                        }
                    }

                    let delay = self.config.strategy.delay_for(attempt + 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn add_to_dlq(&self, job_name: &str, failure: &AttemptFailure, state: &RetryState) {
        let Some(dlq) = &self.dlq else {
            return;
        };
        let work = failure
            .work
            .clone()
            .unwrap_or_else(|| Work::new(serde_json::Value::Null));
        let entry = DlqEntry::new(work, failure.error.clone())
            .with_context("job", job_name)
            .with_metadata("attempts", state.attempt.to_string());
        dlq.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_delays() {
        let strategy = RetryStrategy::Exponential {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
            max_delay: None,
            jitter: 0.0,
        };

        assert_eq!(strategy.delay_for(1), Duration::ZERO);
        assert_eq!(strategy.delay_for(2), Duration::from_secs(1)); // 1 * 2^0
        assert_eq!(strategy.delay_for(3), Duration::from_secs(2)); // 1 * 2^1
        assert_eq!(strategy.delay_for(4), Duration::from_secs(4)); // 1 * 2^2
    }

    #[test]
    fn test_exponential_max_delay_cap() {
        let strategy = RetryStrategy::Exponential {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 10,
            max_delay: Some(Duration::from_secs(3)),
            jitter: 0.0,
        };
        assert_eq!(strategy.delay_for(4), Duration::from_secs(3)); // capped from 4
        assert_eq!(strategy.delay_for(8), Duration::from_secs(3));
    }

    #[test]
    fn test_linear_delays() {
        let strategy = RetryStrategy::Linear {
            initial_delay: Duration::from_secs(2),
            increment: Duration::from_secs(3),
            max_attempts: 5,
            max_delay: None,
        };
        assert_eq!(strategy.delay_for(1), Duration::ZERO);
        assert_eq!(strategy.delay_for(2), Duration::from_secs(2)); // 2 + 3*0
        assert_eq!(strategy.delay_for(3), Duration::from_secs(5)); // 2 + 3*1
        assert_eq!(strategy.delay_for(4), Duration::from_secs(8));
    }

    #[test]
    fn test_constant_and_none() {
        let constant = RetryStrategy::Constant {
            delay: Duration::from_secs(7),
            max_attempts: 3,
        };
        assert_eq!(constant.delay_for(1), Duration::ZERO);
        assert_eq!(constant.delay_for(2), Duration::from_secs(7));
        assert_eq!(constant.delay_for(3), Duration::from_secs(7));

        assert_eq!(RetryStrategy::NoRetry.max_attempts(), 1);
        assert_eq!(RetryStrategy::NoRetry.delay_for(2), Duration::ZERO);
    }

    #[test]
    fn test_retryable_classification() {
        let config = RetryConfig::new(RetryStrategy::NoRetry)
            .with_retryable_categories(vec![ErrorCategory::Timeout, ErrorCategory::Network])
            .with_retryable_codes(vec!["E_FLAKY".to_string()]);

        let timeout = ErrorInfo::message("slow").with_category(ErrorCategory::Timeout);
        assert!(config.is_retryable(&timeout));

        let validation = ErrorInfo::message("bad").with_category(ErrorCategory::Validation);
        assert!(!config.is_retryable(&validation));

        let coded = ErrorInfo::message("flaky")
            .with_category(ErrorCategory::Unknown)
            .with_code("E_FLAKY");
        assert!(config.is_retryable(&coded));

        // An empty config retries everything
        let permissive = RetryConfig::default();
        assert!(permissive.is_retryable(&validation));
    }

    #[test]
    fn test_retry_state_exhaustion() {
        let mut state = RetryState::new();
        state.attempt = 3;
        assert!(!state.exhausted(3));
        state.attempt = 4;
        assert!(state.exhausted(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let orchestrator = RetryOrchestrator::new(
            RetryConfig::new(RetryStrategy::exponential(Duration::from_secs(1), 3)),
            None,
        );

        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();
        let result = orchestrator
            .execute_with_retry("flaky", |_attempt| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AttemptFailure::new(ErrorInfo::message("not yet")))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s before attempt 2, 2s before attempt 3
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_exhaustion_feeds_dlq() {
        let dlq = Arc::new(DeadLetterQueue::unbounded());
        let orchestrator = RetryOrchestrator::new(
            RetryConfig::new(RetryStrategy::Constant {
                delay: Duration::ZERO,
                max_attempts: 2,
            }),
            Some(dlq.clone()),
        );

        let (failure, state) = orchestrator
            .execute_with_retry("doomed", |_attempt| async {
                Err::<(), _>(AttemptFailure::with_work(
                    ErrorInfo::message("always fails"),
                    Work::new(serde_json::json!(9)),
                ))
            })
            .await
            .unwrap_err();

        assert_eq!(failure.error.message, "always fails");
        assert_eq!(state.attempt, 2);
        assert_eq!(state.errors.len(), 2);
        assert_eq!(dlq.len(), 1);

        let entry = &dlq.entries()[0];
        assert_eq!(entry.work.input(), &serde_json::json!(9));
        assert_eq!(entry.context.get("job").map(String::as_str), Some("doomed"));
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let dlq = Arc::new(DeadLetterQueue::unbounded());
        let orchestrator = RetryOrchestrator::new(
            RetryConfig::new(RetryStrategy::Constant {
                delay: Duration::ZERO,
                max_attempts: 5,
            })
            .with_retryable_categories(vec![ErrorCategory::Network]),
            Some(dlq.clone()),
        );

        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = orchestrator
            .execute_with_retry("strict", |_attempt| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AttemptFailure::new(
                        ErrorInfo::message("bad input").with_category(ErrorCategory::Validation),
                    ))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Non-retryable errors bypass the DLQ; they were never retried
        assert_eq!(dlq.len(), 0);
    }

    #[tokio::test]
    async fn test_single_attempt_equals_no_retry() {
        let orchestrator = RetryOrchestrator::new(
            RetryConfig::new(RetryStrategy::Constant {
                delay: Duration::from_secs(30),
                max_attempts: 1,
            }),
            None,
        );

        let calls = Arc::new(AtomicU32::new(0));
        let started = std::time::Instant::now();
        let result: Result<(), _> = orchestrator
            .execute_with_retry("once", |_attempt| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AttemptFailure::new(ErrorInfo::message("nope")))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // No sleep happened on the way out
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
