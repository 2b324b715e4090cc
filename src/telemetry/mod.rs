//! Telemetry
//!
//! Structured logging for Procore operations.
//!
//! - **Logging**: subscriber setup ([`LoggingConfig`], [`init_logging`])
//! - **StructuredLogger**: operation scopes and resilience events carrying
//!   `operation` and `correlation_id` fields

pub mod logging;

pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};

use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Span};

/// Emits the SDK's structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredLogger;

impl StructuredLogger {
    /// Create new structured logger.
    pub fn new() -> Self {
        Self
    }

    /// Open a scope for `operation`. Completion is logged when the scope
    /// is completed or dropped.
    pub fn begin_operation(&self, operation: &str, correlation_id: &str) -> OperationScope {
        let span = info_span!(
            "procore_operation",
            operation = %operation,
            correlation_id = %correlation_id
        );
        span.in_scope(|| info!(operation, correlation_id, "Starting operation"));

        OperationScope {
            span,
            operation: operation.to_string(),
            correlation_id: correlation_id.to_string(),
            start: Instant::now(),
            outcome: None,
        }
    }

    /// Log request duration and outcome.
    pub fn log_performance_metrics(
        &self,
        operation: &str,
        correlation_id: &str,
        duration: Duration,
        success: bool,
    ) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            info!(operation, correlation_id, duration_ms, "Operation completed");
        } else {
            warn!(operation, correlation_id, duration_ms, "Operation failed");
        }
    }

    /// Log a retry attempt.
    pub fn log_retry_attempt(
        &self,
        operation: &str,
        correlation_id: &str,
        attempt: u32,
        delay: Duration,
        reason: &str,
    ) {
        warn!(
            operation,
            correlation_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason,
            "Retrying request"
        );
    }

    /// Log a circuit breaker state change.
    pub fn log_circuit_breaker_state_change(
        &self,
        operation: &str,
        correlation_id: &str,
        state: impl Display,
        reason: Option<&str>,
    ) {
        warn!(
            operation,
            correlation_id,
            state = %state,
            reason = reason.unwrap_or("Not specified"),
            "Circuit breaker state changed"
        );
    }

    /// Log a failed operation.
    pub fn log_error(&self, operation: &str, correlation_id: &str, err: &dyn std::error::Error) {
        error!(operation, correlation_id, error = %err, "Operation error");
    }
}

/// Tracks one logical operation.
pub struct OperationScope {
    span: Span,
    operation: String,
    correlation_id: String,
    start: Instant,
    outcome: Option<bool>,
}

impl OperationScope {
    /// Span to instrument the operation's futures with.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Get the scope's correlation id.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Time since the scope started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Mark the outcome; logged when the scope ends.
    pub fn complete(mut self, success: bool) {
        self.outcome = Some(success);
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        let _entered = self.span.enter();
        match self.outcome {
            Some(false) => warn!(
                operation = %self.operation,
                correlation_id = %self.correlation_id,
                duration_ms,
                "Operation failed"
            ),
            _ => info!(
                operation = %self.operation,
                correlation_id = %self.correlation_id,
                duration_ms,
                "Completed operation"
            ),
        }
    }
}
