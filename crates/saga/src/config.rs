//! Orchestrator configuration.

use std::time::Duration;

/// Retry policy settings, shared by every saga step.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per step, including the first (must be >= 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Randomize each delay by +/-25% to avoid thundering herds.
    pub jitter: bool,
    /// Cumulative retry cap per saga, charged against the persisted retry
    /// count so a repeatedly re-driven saga cannot retry forever.
    pub max_saga_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: true,
            max_saga_retries: 10,
        }
    }
}

/// Circuit breaker settings, one breaker instance per dependency.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Error percentage over the trailing window at which the breaker opens.
    pub error_threshold_percentage: f64,
    /// Number of most recent calls considered when computing the error rate.
    pub window_size: usize,
    /// Minimum calls in the window before the breaker may trip; below this
    /// the error rate is not meaningful.
    pub min_calls: usize,
    /// How long an open breaker waits before letting a trial call through.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold_percentage: 50.0,
            window_size: 10,
            min_calls: 4,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default)]
pub struct SagaConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}
