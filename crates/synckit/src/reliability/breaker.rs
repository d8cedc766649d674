//! Circuit breaker state machine
//!
//! All state lives in one record behind a single mutex. The guarded
//! operation itself runs outside the lock, so a slow dependency never
//! blocks callers that are only checking state.
//!
//! Every transition bumps a generation counter. A call remembers the
//! generation it was admitted under and its outcome is discarded if the
//! breaker has moved on by the time it completes. Without this a success
//! that started in `Closed` could land in `HalfOpen` and count as a probe.

use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::circuit_breaker::{CircuitBreakerConfig, CircuitState};

/// Errors returned by [`CircuitBreaker::execute`]
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// Call rejected without running because the circuit is open
    #[error("circuit breaker is open")]
    Open,

    /// The operation ran and returned an error
    #[error("{0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the call was rejected by an open circuit
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// The operation's own error, if it ran
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Open => None,
            Self::Operation(e) => Some(e),
        }
    }
}

/// Failure and success counters read together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakerCounters {
    /// Failures recorded since the circuit last closed
    pub failures: u32,
    /// Consecutive successes recorded in the current `HalfOpen` window
    pub successes: u32,
}

/// State and counters read together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    #[serde(flatten)]
    pub counters: BreakerCounters,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure_at: Option<Instant>,
    generation: u64,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure_at: None,
            generation: 0,
        }
    }
}

/// Thread-safe circuit breaker
///
/// # Example
///
/// ```
/// use synckit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new(
///     CircuitBreakerConfig::new()
///         .with_failure_threshold(2)
///         .with_reset_timeout(Duration::from_secs(60)),
/// );
///
/// let _ = breaker.execute(|| Err::<(), _>("boom"));
/// let _ = breaker.execute(|| Err::<(), _>("boom"));
/// assert_eq!(breaker.state(), CircuitState::Open);
///
/// let rejected = breaker.execute(|| Ok::<_, &str>(42));
/// assert!(rejected.unwrap_err().is_open());
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in the `Closed` state
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_name("default", config)
    }

    /// Create a named breaker; the name is attached to transition logs
    pub fn with_name(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config: config.normalized(),
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` under the breaker
    ///
    /// In `Open` the operation is not invoked until the reset timeout has
    /// elapsed; the first call after that moves the breaker to `HalfOpen`
    /// and runs as a probe.
    pub fn execute<T, E, F>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.allow().ok_or(CircuitBreakerError::Open)?;

        match operation() {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.failure();
                Err(CircuitBreakerError::Operation(e))
            }
        }
    }

    /// Ask for permission to make one call, reporting the outcome by hand
    ///
    /// Returns `None` when the circuit is open. A permit dropped without
    /// reporting records nothing.
    pub fn allow(&self) -> Option<CircuitPermit<'_>> {
        let mut inner = self.inner.lock();

        if !inner.state.runs_calls() {
            let cooled = inner
                .last_failure_at
                .is_some_and(|at| self.config.cooldown_elapsed(at));
            if !cooled {
                return None;
            }
            self.transition(&mut inner, CircuitState::HalfOpen);
        }

        Some(CircuitPermit {
            breaker: self,
            generation: inner.generation,
        })
    }

    /// Current state
    ///
    /// Does not apply the reset timeout; an expired `Open` circuit reports
    /// `Open` until the next call is attempted.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Failure and success counters from a single critical section
    pub fn counters(&self) -> BreakerCounters {
        let inner = self.inner.lock();
        BreakerCounters {
            failures: inner.failures,
            successes: inner.successes,
        }
    }

    /// State and counters from a single critical section
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            counters: BreakerCounters {
                failures: inner.failures,
                successes: inner.successes,
            },
        }
    }

    /// Force the breaker back to `Closed` with cleared counters
    ///
    /// Outcomes of calls still in flight are discarded.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn record_success(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        if inner.state == CircuitState::HalfOpen {
            inner.successes += 1;
            if inner.successes >= self.config.success_threshold {
                self.transition(&mut inner, CircuitState::Closed);
            }
        }
    }

    fn record_failure(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                inner.last_failure_at = Some(Instant::now());
                if inner.failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.failures += 1;
                inner.last_failure_at = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;

        match to {
            CircuitState::Closed => {
                inner.failures = 0;
                inner.successes = 0;
                inner.last_failure_at = None;
                info!(breaker = %self.name, %from, "circuit breaker closed");
            }
            CircuitState::Open => {
                inner.successes = 0;
                if inner.last_failure_at.is_none() {
                    inner.last_failure_at = Some(Instant::now());
                }
                warn!(
                    breaker = %self.name,
                    %from,
                    failures = inner.failures,
                    reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.successes = 0;
                debug!(breaker = %self.name, "circuit breaker half-open, probing");
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

/// Permission to make one call through a [`CircuitBreaker`]
#[must_use = "a permit records nothing unless success() or failure() is called"]
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
}

impl CircuitPermit<'_> {
    /// Record a successful call
    pub fn success(self) {
        self.breaker.record_success(self.generation);
    }

    /// Record a failed call
    pub fn failure(self) {
        self.breaker.record_failure(self.generation);
    }
}
