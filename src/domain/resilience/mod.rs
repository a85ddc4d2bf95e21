//! Retry, backoff and circuit breaking for remote calls

mod circuit_breaker;
mod client;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use client::{CallOptions, ResilientClient, RetryPredicate};
pub use retry::RetryPolicy;
