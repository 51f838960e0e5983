//! Bounded retry with backoff and jitter.
//!
//! # Algorithm
//! ```text
//! attempt operation
//!   Ok                 → return
//!   Err, not retryable → return immediately (no attempt consumed)
//!   Err, retryable     → failures += 1
//!                        failures == attempts → return the error
//!                        else sleep backoff(failures) + uniform(0, jitter_max), retry
//! ```
//!
//! The first attempt never sleeps. `attempts = 1` disables retrying. Jitter
//! only spreads retries apart; it is not a security property.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use bulwark_core::config::RetrySection;
use bulwark_core::constants::{DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_BASE, DEFAULT_JITTER_MAX_SECS};
use bulwark_core::error::{BulwarkError, ErrorClass, Result};
use bulwark_core::traits::Sleeper;

/// How long to wait before retry number `attempt` (1-based).
#[derive(Clone, Debug, PartialEq)]
pub enum Backoff {
    /// `base^attempt` seconds. Bases below 1.0 are treated as 1.0.
    Exponential {
        /// Growth factor per attempt
        base: f64,
    },
    /// Attempt-indexed list; attempts past the end reuse the last element.
    Schedule(Vec<Duration>),
}

impl Backoff {
    /// Delay before retry `attempt`, without jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Exponential { base } => {
                let base = if base.is_finite() { base.max(1.0) } else { 1.0 };
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                Duration::try_from_secs_f64(base.powi(exponent)).unwrap_or(Duration::MAX)
            }
            Backoff::Schedule(delays) => {
                let index = (attempt.max(1) as usize - 1).min(delays.len().saturating_sub(1));
                delays.get(index).copied().unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// Immutable retry settings for one call.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included (0 behaves as 1)
    pub attempts: u32,
    /// Delay between attempts
    pub backoff: Backoff,
    /// Upper bound of uniform jitter added to each delay
    pub jitter_max: Duration,
    /// Error classes worth another attempt
    pub retryable_classes: HashSet<ErrorClass>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Backoff::Exponential {
                base: DEFAULT_BACKOFF_BASE,
            },
            jitter_max: Duration::from_secs_f64(DEFAULT_JITTER_MAX_SECS),
            retryable_classes: ErrorClass::TRANSIENT.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from the `retries` section of the policy file.
    ///
    /// Uses the configured delay schedule and the transient error classes.
    pub fn from_config(section: &RetrySection) -> Self {
        Self {
            attempts: section.attempts,
            backoff: Backoff::Schedule(section.schedule()),
            jitter_max: section.jitter(),
            retryable_classes: ErrorClass::TRANSIENT.into_iter().collect(),
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the attempt count.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the backoff strategy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the jitter bound.
    pub fn with_jitter(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// Adds an error class to the retryable set.
    pub fn retrying(mut self, class: ErrorClass) -> Self {
        self.retryable_classes.insert(class);
        self
    }

    /// Removes an error class from the retryable set.
    pub fn not_retrying(mut self, class: ErrorClass) -> Self {
        self.retryable_classes.remove(&class);
        self
    }

    /// Returns true if `error` is worth another attempt.
    pub fn is_retryable(&self, error: &BulwarkError) -> bool {
        self.retryable_classes.contains(&error.class())
    }

    /// Delay before retry `attempt`, jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff.delay(attempt);
        if self.jitter_max.is_zero() {
            return base;
        }
        let jitter = self.jitter_max.mul_f64(rand::thread_rng().gen::<f64>());
        base.saturating_add(jitter)
    }

    fn effective_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Sleeps on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drives an operation through a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryExecutor {
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    /// Creates an executor that sleeps on the tokio timer.
    pub fn new() -> Self {
        Self::with_sleeper(Arc::new(TokioSleeper))
    }

    /// Creates an executor with a custom sleeper.
    pub fn with_sleeper(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or exhausts `policy.attempts`. Returns the latest error on failure.
    pub async fn execute<T, F, Fut>(&self, policy: &RetryPolicy, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = policy.effective_attempts();
        let mut failures = 0u32;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !policy.is_retryable(&error) {
                debug!(error = %error, class = ?error.class(), "Not retryable");
                return Err(error);
            }

            failures += 1;
            if failures >= attempts {
                warn!(attempts, error = %error, "Retries exhausted");
                return Err(error);
            }

            let delay = policy.delay(failures);
            debug!(attempt = failures, delay_ms = delay.as_millis() as u64, error = %error, "Retrying");
            self.sleeper.sleep(delay).await;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSleeper;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn recording() -> (RetryExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        (RetryExecutor::with_sleeper(sleeper.clone()), sleeper)
    }

    fn server_error() -> BulwarkError {
        BulwarkError::HttpStatus {
            status: 503,
            url: "https://api.example.com".into(),
        }
    }

    /// Fails `failures` times with a retryable error, then succeeds.
    fn flaky(failures: u32, calls: &AtomicU32) -> impl FnMut() -> std::future::Ready<Result<u32>> + '_ {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures { Err(server_error()) } else { Ok(n) })
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential { base: 2.0 };
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_exponential_base_below_one_is_clamped() {
        let backoff = Backoff::Exponential { base: 0.5 };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_backoff_saturates() {
        let backoff = Backoff::Exponential { base: 10.0 };
        assert_eq!(backoff.delay(400), Duration::MAX);
    }

    #[test]
    fn test_schedule_clamps_to_last() {
        let backoff = Backoff::Schedule(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(5),
        ]);
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(5));
        assert_eq!(backoff.delay(9), Duration::from_secs(5));
        assert_eq!(Backoff::Schedule(vec![]).delay(1), Duration::ZERO);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&RetrySection::default());
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(7), Duration::from_secs(5));
        assert!(policy.is_retryable(&server_error()));
    }

    #[test]
    fn test_jitter_stays_in_envelope() {
        let policy = RetryPolicy::default()
            .with_backoff(Backoff::Exponential { base: 2.0 })
            .with_jitter(Duration::from_millis(250));
        for _ in 0..100 {
            let delay = policy.delay(2);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay < Duration::from_millis(4250));
        }
    }

    #[tokio::test]
    async fn test_success_after_failures_sleeps_once_per_failure() {
        let attempts = 5;
        let jitter = Duration::from_millis(500);

        for failures in 0..attempts {
            let (executor, sleeper) = recording();
            let policy = RetryPolicy::default()
                .with_attempts(attempts)
                .with_backoff(Backoff::Exponential { base: 2.0 })
                .with_jitter(jitter);
            let calls = AtomicU32::new(0);

            let result = executor.execute(&policy, flaky(failures, &calls)).await;

            assert_eq!(result.unwrap(), failures);
            let delays = sleeper.delays();
            assert_eq!(delays.len(), failures as usize);
            for (i, delay) in delays.iter().enumerate() {
                let floor = Duration::from_secs(2u64.pow(i as u32 + 1));
                assert!(*delay >= floor && *delay < floor + jitter);
            }
            // Envelopes never shrink
            assert!(delays
                .windows(2)
                .all(|w| w[1] >= w[0].saturating_sub(jitter)));
        }
    }

    #[tokio::test]
    async fn test_exhaustion_returns_latest_error() {
        let (executor, sleeper) = recording();
        let policy = RetryPolicy::default().with_attempts(3).with_jitter(Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(&policy, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(BulwarkError::Timeout(format!("attempt {n}"))) }
            })
            .await;

        match result {
            Err(BulwarkError::Timeout(msg)) => assert_eq!(msg, "attempt 2"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No sleep after the final attempt
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_propagates_immediately() {
        let (executor, sleeper) = recording();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(&RetryPolicy::default(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(BulwarkError::InvalidUrl("::".into())) }
            })
            .await;

        assert!(matches!(result, Err(BulwarkError::InvalidUrl(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_non_retryable_does_not_consume_an_attempt() {
        let (executor, _) = recording();
        let policy = RetryPolicy::default().with_attempts(2).with_jitter(Duration::ZERO);
        let calls = AtomicU32::new(0);

        // retryable, then non-retryable: the second error ends the loop
        // even though one attempt is still available
        let result = executor
            .execute(&policy, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err::<(), _>(server_error())
                    } else {
                        Err(BulwarkError::HttpStatus { status: 404, url: "u".into() })
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_attempt_disables_retry() {
        let (executor, sleeper) = recording();
        let calls = AtomicU32::new(0);

        let result = executor.execute(&RetryPolicy::no_retry(), flaky(1, &calls)).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_behaves_as_one() {
        let (executor, _) = recording();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(&RetryPolicy::default().with_attempts(0), flaky(0, &calls))
            .await;

        assert_eq!(result.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_retryable_classes() {
        let (executor, _) = recording();
        let policy = RetryPolicy::default()
            .with_attempts(3)
            .with_jitter(Duration::ZERO)
            .not_retrying(ErrorClass::ServerError);
        let calls = AtomicU32::new(0);

        let result = executor.execute(&policy, flaky(2, &calls)).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tokio_sleeper_waits() {
        let start = std::time::Instant::now();
        TokioSleeper.sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
