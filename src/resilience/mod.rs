//! Resilience
//!
//! Retry, circuit breaker and timeout policies for Procore API calls.

pub mod circuit_breaker;
pub mod context;
pub mod handler;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerStats, CircuitState, Permit, TrialGuard,
    CIRCUIT_BREAKING_STATUS_CODES,
};
pub use context::{ResilienceContext, CORRELATION_ID_HEADER};
pub use handler::ResilientTransport;
pub use retry::{RetryPolicy, RetryStats, RETRYABLE_STATUS_CODES};
