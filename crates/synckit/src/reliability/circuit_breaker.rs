//! Breaker states and thresholds

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Where a [`CircuitBreaker`](super::CircuitBreaker) stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls run; each failure is counted toward the threshold
    Closed,

    /// Calls are refused until the cooldown has passed
    Open,

    /// Calls run as probes; one failure reopens
    HalfOpen,
}

impl CircuitState {
    /// Stable lowercase name, as used in logs and json
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Returns true if a call in this state runs without a cooldown check
    pub fn runs_calls(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and cooldown for a [`CircuitBreaker`](super::CircuitBreaker)
///
/// | from       | event                                   | to         |
/// |------------|-----------------------------------------|------------|
/// | `Closed`   | `failure_threshold` failures            | `Open`     |
/// | `Open`     | call after more than `reset_timeout`    | `HalfOpen` |
/// | `HalfOpen` | `success_threshold` successes in a row  | `Closed`   |
/// | `HalfOpen` | one failure                             | `Open`     |
///
/// Both thresholds are at least 1; the builders clamp, and the breaker
/// clamps again for configs built as struct literals.
///
/// ```
/// use synckit::CircuitBreakerConfig;
/// use std::time::Duration;
///
/// let config = CircuitBreakerConfig::new()
///     .with_failure_threshold(3)
///     .with_reset_timeout(Duration::from_millis(50));
/// assert_eq!(config.success_threshold, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failures counted in `Closed` before the circuit opens
    pub failure_threshold: u32,

    /// Successes in a row during `HalfOpen` before the circuit closes
    pub success_threshold: u32,

    /// Cooldown measured from the failure that opened the circuit
    #[serde(with = "millis")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Defaults: 5 failures, 2 successes, 30s cooldown
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Same config with both thresholds raised to at least 1
    pub(crate) fn normalized(self) -> Self {
        Self {
            failure_threshold: self.failure_threshold.max(1),
            success_threshold: self.success_threshold.max(1),
            ..self
        }
    }

    /// Returns true once strictly more than `reset_timeout` has passed since `since`
    pub(crate) fn cooldown_elapsed(&self, since: Instant) -> bool {
        since.elapsed() > self.reset_timeout
    }
}

/// `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
