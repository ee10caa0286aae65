//! Bounded exponential-backoff retry policy.

use std::future::Future;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RetryConfig;
use crate::error::SagaError;

/// A successful operation plus the retries it took to get there.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    /// Re-attempts made after the first call (0 = first try succeeded).
    pub retries: u32,
}

/// A failed operation plus the retries spent before giving up.
#[derive(Debug)]
pub struct RetryFailure {
    pub error: SagaError,
    pub retries: u32,
}

/// Retry policy with exponential backoff and optional jitter.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`. The dependency's circuit breaker is consulted before every
/// attempt and fed every attempt's outcome, so the breaker sees the true
/// call history, not just final results.
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a retry policy from configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The configured retry budget (total attempts per step).
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Attempts allowed for one call given retries the saga has already
    /// spent. The first attempt is always allowed; only re-attempts are
    /// charged against `max_saga_retries`.
    pub fn attempts_allowed(&self, spent_retries: u32) -> u32 {
        let remaining = self.config.max_saga_retries.saturating_sub(spent_retries);
        self.config.max_attempts.max(1).min(remaining.saturating_add(1))
    }

    /// Backoff delay after a failed attempt (`attempt` is 1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let delay = self
            .config
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.config.max_delay);

        if self.config.jitter {
            apply_jitter(delay)
        } else {
            delay
        }
    }

    /// Runs `operation` until it succeeds, fails non-retriably, the breaker
    /// rejects an attempt, or the attempt budget is exhausted.
    ///
    /// An open breaker short-circuits with [`SagaError::CircuitOpen`] before
    /// the operation runs. Exhaustion is reported as
    /// [`SagaError::RetriesExhausted`] wrapping the last transient error. In
    /// every outcome `retries` counts re-attempts only, so an exhausted run
    /// reports `max_attempts - 1`.
    pub async fn execute<T, F, Fut>(
        &self,
        breaker: &CircuitBreaker,
        operation: F,
    ) -> Result<Retried<T>, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SagaError>>,
    {
        self.execute_with_budget(breaker, 0, operation).await
    }

    /// Like [`execute`], with `spent_retries` already charged against the
    /// saga-wide `max_saga_retries` cap. A saga that has spent its whole
    /// budget still gets one attempt per step, but no re-attempts.
    ///
    /// [`execute`]: RetryPolicy::execute
    pub async fn execute_with_budget<T, F, Fut>(
        &self,
        breaker: &CircuitBreaker,
        spent_retries: u32,
        mut operation: F,
    ) -> Result<Retried<T>, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SagaError>>,
    {
        let attempts_allowed = self.attempts_allowed(spent_retries);
        let mut retries = 0;
        for attempt in 1..=attempts_allowed {
            if !breaker.allow() {
                return Err(RetryFailure {
                    error: SagaError::CircuitOpen {
                        dependency: breaker.dependency(),
                    },
                    retries,
                });
            }
            match operation().await {
                Ok(value) => {
                    breaker.record_result(true);
                    return Ok(Retried { value, retries });
                }
                Err(error) => {
                    breaker.record_result(false);

                    if !error.is_retriable() {
                        return Err(RetryFailure { error, retries });
                    }
                    if attempt >= attempts_allowed {
                        return Err(RetryFailure {
                            error: SagaError::RetriesExhausted {
                                attempts: attempt,
                                source: Box::new(error),
                            },
                            retries,
                        });
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient failure, retrying after backoff"
                    );
                    retries += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
        unreachable!("retry loop always returns within the attempt budget")
    }
}

/// Randomizes a delay by +/-25% without pulling in a RNG dependency.
fn apply_jitter(delay: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    // Linear congruential step over the clock reading
    let mixed = nanos.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    // Map into [75, 125] percent
    let percent = 75 + (mixed % 51);
    Duration::from_nanos((delay.as_nanos() as u64 / 100).saturating_mul(percent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32, jitter: bool) -> RetryPolicy {
        policy_with_cap(max_attempts, jitter, 10)
    }

    fn policy_with_cap(max_attempts: u32, jitter: bool, max_saga_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            jitter,
            max_saga_retries,
        })
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig::default())
    }

    fn transient() -> SagaError {
        SagaError::ServiceUnavailable {
            service: "test",
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy(5, false);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        // Capped at max_delay from here on
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(400));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = policy(3, true);
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(75), "delay {delay:?} below -25%");
            assert!(delay <= Duration::from_millis(125), "delay {delay:?} above +25%");
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_has_zero_retries() {
        let breaker = breaker();
        let result = policy(3, false)
            .execute(&breaker, || async { Ok::<_, SagaError>(42) })
            .await
            .unwrap();
        assert_eq!(result.value, 42);
        assert_eq!(result.retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures_until_success() {
        let breaker = breaker();
        let calls = AtomicU32::new(0);
        let result = policy(3, false)
            .execute(&breaker, || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(transient())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result.value, "done");
        assert_eq!(result.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_max_attempts() {
        let breaker = breaker();
        let calls = AtomicU32::new(0);
        let failure = policy(3, false)
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failure.retries, 2);
        assert!(matches!(
            failure.error,
            SagaError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spent_retries_shrink_the_attempt_budget() {
        let breaker = breaker();
        let calls = AtomicU32::new(0);
        // Cap of 3 with 2 already spent leaves one re-attempt
        let failure = policy_with_cap(3, false, 3)
            .execute_with_budget(&breaker, 2, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(failure.retries, 1);
        assert!(matches!(
            failure.error,
            SagaError::RetriesExhausted { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_exhausted_saga_budget_still_allows_one_attempt() {
        let breaker = breaker();
        let calls = AtomicU32::new(0);
        let failure = policy_with_cap(3, false, 2)
            .execute_with_budget(&breaker, 2, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.retries, 0);
        assert!(matches!(
            failure.error,
            SagaError::RetriesExhausted { attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_non_retriable_error_aborts_immediately() {
        let breaker = breaker();
        let calls = AtomicU32::new(0);
        let failure = policy(3, false)
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SagaError::PaymentDeclined("declined".to_string())) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.retries, 0);
        assert!(matches!(failure.error, SagaError::PaymentDeclined(_)));
    }

    #[tokio::test]
    async fn test_open_breaker_rejects_without_calling() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                min_calls: 1,
                ..CircuitBreakerConfig::default()
            },
        );
        breaker.record_result(false);

        let calls = AtomicU32::new(0);
        let failure = policy(3, false)
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SagaError>(()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(failure.retries, 0);
        assert!(matches!(failure.error, SagaError::CircuitOpen { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_feeds_the_breaker() {
        let breaker = breaker();
        let _ = policy(3, false)
            .execute(&breaker, || async { Err::<(), _>(transient()) })
            .await;

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.window_calls, 3);
        assert_eq!(snapshot.error_rate, 100.0);
    }
}
