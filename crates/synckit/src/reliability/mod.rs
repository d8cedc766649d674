//! Reliability patterns
//!
//! This module provides:
//! - [`CircuitBreaker`] - three-state failure-isolation state machine
//! - [`CircuitBreakerConfig`] - thresholds and open-state cooldown
//!
//! Nothing here retries. Retry policy is a caller concern layered on top of
//! the breaker.

mod breaker;
mod circuit_breaker;

pub use breaker::{
    BreakerCounters, BreakerSnapshot, CircuitBreaker, CircuitBreakerError, CircuitPermit,
};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState};
