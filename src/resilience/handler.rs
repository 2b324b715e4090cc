//! Resilience Handler
//!
//! Transport decorator applying retry, circuit breaker and timeout policies.
//! Retry is the outermost policy, the timeout applies to each attempt.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info_span, Instrument};

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerStats, CircuitState, Permit, TrialGuard, Transition,
};
use super::context::{ResilienceContext, CORRELATION_ID_HEADER};
use super::retry::{RetryPolicy, RetryStats};
use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ApiError, NetworkError, ProcoreError, ProcoreResult};
use crate::telemetry::StructuredLogger;
use crate::types::ResilienceOptions;

const CIRCUIT_OPEN_MESSAGE: &str = "Service is temporarily unavailable due to repeated failures";

/// [`HttpTransport`] that applies the configured resilience policies.
pub struct ResilientTransport<T: HttpTransport + ?Sized> {
    inner: Arc<T>,
    options: ResilienceOptions,
    retry: RetryPolicy,
    circuit_breaker: CircuitBreaker,
    logger: StructuredLogger,
}

impl<T: HttpTransport + ?Sized> ResilientTransport<T> {
    /// Create new resilient transport around `inner`.
    pub fn new(inner: Arc<T>, options: ResilienceOptions) -> Self {
        Self {
            inner,
            retry: RetryPolicy::new(options.retry.clone()),
            circuit_breaker: CircuitBreaker::new(options.circuit_breaker.clone()),
            options,
            logger: StructuredLogger::new(),
        }
    }

    /// Get current circuit state.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Force the circuit closed.
    pub fn reset_circuit(&self) {
        self.circuit_breaker.reset();
    }

    /// Get circuit breaker statistics.
    pub fn circuit_breaker_stats(&self) -> CircuitBreakerStats {
        self.circuit_breaker.get_stats()
    }

    /// Get retry statistics.
    pub fn retry_stats(&self) -> RetryStats {
        self.retry.get_stats()
    }

    fn attempt_timeout(&self, request: &HttpRequest) -> Option<Duration> {
        if !self.options.timeout.enabled {
            return request.timeout;
        }
        Some(request.timeout.unwrap_or(if request.multipart.is_some() {
            self.options.timeout.long_running_timeout
        } else {
            self.options.timeout.default_timeout
        }))
    }

    fn log_transition(&self, ctx: &ResilienceContext, transition: Option<Transition>, reason: &str) {
        if let Some((_, to)) = transition {
            if self.options.logging.log_circuit_breaker_events {
                self.logger.log_circuit_breaker_state_change(
                    &ctx.operation,
                    &ctx.correlation_id,
                    to,
                    Some(reason),
                );
            }
        }
    }

    async fn execute(
        &self,
        request: HttpRequest,
        ctx: &mut ResilienceContext,
    ) -> ProcoreResult<HttpResponse> {
        let timeout = self.attempt_timeout(&request);

        loop {
            self.retry.record_attempt();
            let result = self.attempt(request.clone(), ctx, timeout).await;
            let retries_left = ctx.attempt_number <= self.retry.max_retries();

            match result {
                Ok(response) => {
                    let retryable = self.retry.is_retryable_status(response.status);
                    if retryable && retries_left {
                        let delay = self.retry.delay_for_response(ctx.attempt_number, &response);
                        ctx.last_error = Some(format!("HTTP {}", response.status));
                        self.before_retry(ctx, delay).await;
                        continue;
                    }
                    self.retry.record_outcome(ctx.attempt_number, !retryable);
                    return Ok(response);
                }
                Err(e) => {
                    if self.retry.is_retryable_error(&e) && retries_left {
                        let delay = self.retry.calculate_delay(ctx.attempt_number);
                        ctx.last_error = Some(e.to_string());
                        self.before_retry(ctx, delay).await;
                        continue;
                    }
                    self.retry.record_outcome(ctx.attempt_number, false);
                    return Err(e);
                }
            }
        }
    }

    async fn before_retry(&self, ctx: &mut ResilienceContext, delay: Duration) {
        if self.options.logging.log_retry_attempts {
            self.logger.log_retry_attempt(
                &ctx.operation,
                &ctx.correlation_id,
                ctx.attempt_number,
                delay,
                ctx.last_error.as_deref().unwrap_or("unknown"),
            );
        }
        tokio::time::sleep(delay).await;
        ctx.increment_attempt();
    }

    /// One attempt through the circuit breaker and timeout.
    async fn attempt(
        &self,
        request: HttpRequest,
        ctx: &ResilienceContext,
        timeout: Option<Duration>,
    ) -> ProcoreResult<HttpResponse> {
        let (permit, transition) = self.circuit_breaker.try_acquire();
        self.log_transition(ctx, transition, "Break duration elapsed, allowing trial request");

        if let Permit::Rejected(remaining) = permit {
            error!(
                operation = %ctx.operation,
                correlation_id = %ctx.correlation_id,
                remaining_ms = remaining.as_millis() as u64,
                "Circuit breaker is open"
            );
            return Err(ApiError::ServiceUnavailable {
                message: CIRCUIT_OPEN_MESSAGE.to_string(),
                retry_after: Some(self.options.circuit_breaker.duration_of_break),
                correlation_id: Some(ctx.correlation_id.clone()),
            }
            .into());
        }
        // Frees the half-open slot if this future is dropped mid-request.
        let trial: Option<TrialGuard<'_>> =
            (permit == Permit::Trial).then(|| self.circuit_breaker.trial_guard());

        let start = Instant::now();
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.inner.send(request)).await {
                Ok(result) => result,
                Err(_) => {
                    if self.options.logging.log_timeouts {
                        error!(
                            operation = %ctx.operation,
                            correlation_id = %ctx.correlation_id,
                            attempt = ctx.attempt_number,
                            timeout_ms = limit.as_millis() as u64,
                            "Request timed out"
                        );
                    }
                    Err(NetworkError::Timeout { timeout: limit }.into())
                }
            },
            None => self.inner.send(request).await,
        };

        let (transition, recorded, ok) = match &result {
            Ok(response) if CircuitBreaker::is_failure_status(response.status) => {
                (self.circuit_breaker.record_failure(), true, false)
            }
            Ok(response) => (
                self.circuit_breaker.record_success(),
                true,
                response.is_success(),
            ),
            Err(ProcoreError::Network(_)) => (self.circuit_breaker.record_failure(), true, false),
            // Neither outcome; dropping the guard releases the trial.
            Err(_) => (None, false, false),
        };
        if let Some(guard) = trial {
            if recorded {
                guard.disarm();
            }
        }
        self.log_transition(ctx, transition, "Request outcome");

        if self.options.logging.log_performance_metrics {
            self.logger.log_performance_metrics(
                &ctx.operation,
                &ctx.correlation_id,
                start.elapsed(),
                ok,
            );
        }

        result
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for ResilientTransport<T> {
    async fn send(&self, mut request: HttpRequest) -> ProcoreResult<HttpResponse> {
        let mut ctx = ResilienceContext::for_request(&request);
        request.set_header(CORRELATION_ID_HEADER, ctx.correlation_id.clone());

        if self.options.logging.include_request_details {
            debug!(method = %request.method, url = %request.url, "Sending request");
        }

        let span = info_span!(
            "procore_request",
            operation = %ctx.operation,
            correlation_id = %ctx.correlation_id
        );
        let result = self.execute(request, &mut ctx).instrument(span).await;

        if let Err(e) = &result {
            self.logger.log_error(&ctx.operation, &ctx.correlation_id, e);
        }
        result
    }
}
