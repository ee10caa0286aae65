//! Per-dependency circuit breaker.
//!
//! Each external dependency (inventory, payment, notification) gets its own
//! breaker so a failing payment provider cannot block stock verification.
//! State is process-local: in a multi-replica deployment each replica trips
//! independently.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::config::CircuitBreakerConfig;

/// Breaker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally; outcomes are tracked in the rolling window.
    Closed,
    /// Calls are rejected without reaching the dependency.
    Open,
    /// The reset timeout elapsed; a single trial call decides what's next.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state name for logs and stats.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of one breaker, for health reporting.
#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    /// Dependency this breaker guards.
    pub dependency: &'static str,
    /// Current state, after applying any pending open -> half-open move.
    pub state: CircuitState,
    /// Error percentage over the rolling window (0.0 when the window is empty).
    pub error_rate: f64,
    /// Calls currently in the rolling window.
    pub window_calls: usize,
    /// When the breaker last opened, if it is not closed.
    pub opened_at: Option<DateTime<Utc>>,
}

struct Inner {
    state: CircuitState,
    /// Rolling window of call outcomes, newest at the back. true = success.
    window: VecDeque<bool>,
    /// Set while the half-open trial call is out; no other call may pass.
    trial_in_flight: bool,
    opened_instant: Option<Instant>,
    opened_at: Option<DateTime<Utc>>,
}

/// Rolling-window circuit breaker.
///
/// The breaker trips from `Closed` to `Open` when the error percentage over
/// the trailing `window_size` calls reaches the configured threshold, but
/// only once the window holds at least `min_calls` samples. While `Open`,
/// [`CircuitBreaker::allow`] rejects every call until `reset_timeout` has
/// elapsed, then moves to `HalfOpen` and lets one trial call through: a
/// success closes the breaker and clears the window, a failure re-opens it
/// and restarts the timeout.
pub struct CircuitBreaker {
    dependency: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker for the named dependency.
    pub fn new(dependency: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            dependency,
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                trial_in_flight: false,
                opened_instant: None,
                opened_at: None,
            }),
        }
    }

    /// The dependency this breaker guards.
    pub fn dependency(&self) -> &'static str {
        self.dependency
    }

    /// Returns whether a call may proceed right now.
    ///
    /// An `Open` breaker whose reset timeout has elapsed transitions to
    /// `HalfOpen` here and admits the call as the trial. Exactly one trial
    /// is out at a time; further callers are rejected until its outcome is
    /// recorded.
    pub fn allow(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
            CircuitState::Open => {
                let elapsed = inner
                    .opened_instant
                    .map(|at| at.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!(
                        dependency = self.dependency,
                        "circuit breaker reset timeout elapsed, moving to half-open"
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records the outcome of a call that was admitted by [`allow`].
    ///
    /// [`allow`]: CircuitBreaker::allow
    pub fn record_result(&self, success: bool) {
        let mut inner = self.lock();

        inner.window.push_back(success);
        while inner.window.len() > self.config.window_size {
            inner.window.pop_front();
        }

        match inner.state {
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                if success {
                    tracing::info!(dependency = self.dependency, "trial call succeeded, closing circuit");
                    self.close(&mut inner);
                } else {
                    tracing::warn!(dependency = self.dependency, "trial call failed, re-opening circuit");
                    self.open(&mut inner);
                }
            }
            CircuitState::Closed => {
                if !success
                    && inner.window.len() >= self.config.min_calls
                    && Self::error_rate_of(&inner.window) >= self.config.error_threshold_percentage
                {
                    tracing::warn!(
                        dependency = self.dependency,
                        error_rate = Self::error_rate_of(&inner.window),
                        "error threshold reached, opening circuit"
                    );
                    self.open(&mut inner);
                }
            }
            // Results from calls already in flight when the breaker opened.
            CircuitState::Open => {}
        }
    }

    /// Current state, applying any pending open -> half-open transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_instant
                .map(|at| at.elapsed() >= self.config.reset_timeout)
                .unwrap_or(true);
            if elapsed {
                inner.state = CircuitState::HalfOpen;
            }
        }
        inner.state
    }

    /// Takes a point-in-time snapshot for health reporting.
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.state();
        let inner = self.lock();
        CircuitBreakerSnapshot {
            dependency: self.dependency,
            state,
            error_rate: Self::error_rate_of(&inner.window),
            window_calls: inner.window.len(),
            opened_at: inner.opened_at,
        }
    }

    fn open(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.trial_in_flight = false;
        inner.opened_instant = Some(Instant::now());
        inner.opened_at = Some(Utc::now());
        metrics::counter!("circuit_breaker_opened_total", "dependency" => self.dependency)
            .increment(1);
    }

    fn close(&self, inner: &mut Inner) {
        inner.state = CircuitState::Closed;
        inner.trial_in_flight = false;
        inner.window.clear();
        inner.opened_instant = None;
        inner.opened_at = None;
    }

    fn error_rate_of(window: &VecDeque<bool>) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        let failures = window.iter().filter(|success| !**success).count();
        failures as f64 * 100.0 / window.len() as f64
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Inner mutations cannot panic, so the lock cannot be poisoned.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
