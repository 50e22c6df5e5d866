//! Circuit Breaker (C10): Closed/Open/Half-Open guard in front of each
//! external adapter (cache, pub/sub, persistent queue).
//!
//! An explicit named state machine rather than a boolean flag, so adapters
//! that lazily reconnect on next use still get a consistent trip/settle
//! policy. Counters are mutated under the breaker's own lock, independent
//! of whatever lock the wrapped adapter holds.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use lix_core::{LixError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    pub failure_threshold: f64,
    pub reset_timeout: Duration,
    /// Minimum observed requests before the failure-ratio trip condition
    /// applies.
    pub min_requests_for_ratio: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            failure_threshold: 0.5,
            reset_timeout: Duration::from_secs(30),
            min_requests_for_ratio: 10,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    state: Option<CircuitState>,
    consecutive_failures: u32,
    total_requests: u64,
    total_successes: u64,
    last_failure_at: Option<Instant>,
    /// Set when `Open` admits a trial call, to make the one-trial rule in
    /// Half-Open exclusive under concurrent callers.
    half_open_trial_in_flight: bool,
}

/// Per-dependency circuit breaker. Named after the adapter it guards
/// (`"cache"`, `"pubsub"`, `"queue"`) for metrics and log correlation.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Counters>,
}

/// Outcome of [`CircuitBreaker::try_acquire`]: whether the caller may
/// proceed, and if so, whether this is the single Half-Open trial call.
enum Admission {
    Proceed,
    FastFail,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Counters {
                state: Some(CircuitState::Closed),
                ..Counters::default()
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        let mut counters = self.inner.lock().unwrap();
        self.settle_timeout(&mut counters);
        counters.state.unwrap_or(CircuitState::Closed)
    }

    /// Re-evaluate an `Open` breaker against the reset timeout, moving it to
    /// `HalfOpen` if the timeout has elapsed. Called with the lock held.
    fn settle_timeout(&self, counters: &mut Counters) {
        if counters.state == Some(CircuitState::Open) {
            if let Some(last_failure) = counters.last_failure_at {
                if last_failure.elapsed() >= self.config.reset_timeout {
                    counters.state = Some(CircuitState::HalfOpen);
                    counters.half_open_trial_in_flight = false;
                }
            }
        }
    }

    fn try_acquire(&self) -> Admission {
        let mut counters = self.inner.lock().unwrap();
        self.settle_timeout(&mut counters);

        match counters.state.unwrap_or(CircuitState::Closed) {
            CircuitState::Closed => Admission::Proceed,
            CircuitState::Open => Admission::FastFail,
            CircuitState::HalfOpen => {
                if counters.half_open_trial_in_flight {
                    Admission::FastFail
                } else {
                    counters.half_open_trial_in_flight = true;
                    Admission::Proceed
                }
            }
        }
    }

    fn record_success(&self) {
        let mut counters = self.inner.lock().unwrap();
        counters.total_requests += 1;
        counters.total_successes += 1;

        match counters.state.unwrap_or(CircuitState::Closed) {
            CircuitState::HalfOpen => {
                counters.state = Some(CircuitState::Closed);
                counters.consecutive_failures = 0;
                counters.half_open_trial_in_flight = false;
            }
            _ => {
                counters.consecutive_failures = 0;
            }
        }
    }

    fn record_failure(&self) {
        let mut counters = self.inner.lock().unwrap();
        counters.total_requests += 1;
        counters.consecutive_failures += 1;
        counters.last_failure_at = Some(Instant::now());

        match counters.state.unwrap_or(CircuitState::Closed) {
            CircuitState::HalfOpen => {
                counters.state = Some(CircuitState::Open);
                counters.half_open_trial_in_flight = false;
            }
            CircuitState::Closed => {
                let ratio_tripped = counters.total_requests >= self.config.min_requests_for_ratio
                    && (counters.total_requests - counters.total_successes) as f64
                        / counters.total_requests as f64
                        > self.config.failure_threshold;
                if counters.consecutive_failures >= self.config.max_failures || ratio_tripped {
                    counters.state = Some(CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Run `op` guarded by the breaker: fast-fails with `CircuitOpen` without
    /// calling `op` at all when the circuit is open (or a Half-Open trial is
    /// already in flight); otherwise runs `op` and records the outcome.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match self.try_acquire() {
            Admission::FastFail => {
                return Err(LixError::CircuitOpen(format!("circuit '{}' is open", self.name)));
            }
            Admission::Proceed => {}
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let counters = self.inner.lock().unwrap();
        CircuitMetrics {
            state: counters.state.unwrap_or(CircuitState::Closed),
            consecutive_failures: counters.consecutive_failures,
            total_requests: counters.total_requests,
            total_successes: counters.total_successes,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_successes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig { max_failures: 3, reset_timeout: Duration::from_millis(20), ..Default::default() },
        )
    }

    async fn fail(b: &CircuitBreaker) -> Result<()> {
        b.call(|| async { Err::<(), _>(LixError::Transient("boom".into())) }).await
    }

    async fn succeed(b: &CircuitBreaker) -> Result<()> {
        b.call(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let b = breaker();
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_fast_fails_without_calling_op() {
        let b = breaker();
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        let result = b.call(|| async { Ok::<_, LixError>(()) }).await;
        assert!(matches!(result, Err(LixError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn half_open_after_reset_timeout_success_closes() {
        let b = breaker();
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(b.state(), CircuitState::HalfOpen);
        succeed(&b).await.unwrap();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let b = breaker();
        for _ in 0..3 {
            let _ = fail(&b).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(b.state(), CircuitState::HalfOpen);
        let _ = fail(&b).await;
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn failure_ratio_trips_after_min_requests() {
        let b = CircuitBreaker::new(
            "ratio",
            CircuitBreakerConfig { max_failures: 100, failure_threshold: 0.5, min_requests_for_ratio: 10, ..Default::default() },
        );
        for _ in 0..5 {
            succeed(&b).await.unwrap();
        }
        for _ in 0..6 {
            let _ = fail(&b).await;
        }
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let b = breaker();
        let _ = fail(&b).await;
        let _ = fail(&b).await;
        succeed(&b).await.unwrap();
        assert_eq!(b.metrics().consecutive_failures, 0);
        assert_eq!(b.state(), CircuitState::Closed);
    }
}
