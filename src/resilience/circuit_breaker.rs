//! Circuit Breaker
//!
//! Consecutive-failure circuit breaker protecting the Procore API.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::types::CircuitBreakerOptions;

/// Status codes counted as failures by the breaker.
pub const CIRCUIT_BREAKING_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// A single trial request is allowed through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("Closed"),
            Self::Open => f.write_str("Open"),
            Self::HalfOpen => f.write_str("HalfOpen"),
        }
    }
}

/// Circuit breaker statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub total_requests: u32,
    pub successful_requests: u32,
    pub failed_requests: u32,
    pub rejected_requests: u32,
    pub state_transitions: u32,
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Outcome of asking the breaker for permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Circuit closed, send normally.
    Allowed,
    /// The single half-open trial. Hold a [`TrialGuard`] until its outcome is recorded.
    Trial,
    /// Rejected; the circuit re-evaluates after this long.
    Rejected(Duration),
}

/// A state change, returned so callers can log it with request context.
pub type Transition = (CircuitState, CircuitState);

/// Holds the half-open trial slot. Dropping it before the outcome is
/// recorded, e.g. when the request future is cancelled, frees the slot.
#[must_use]
pub struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl TrialGuard<'_> {
    /// The outcome was recorded; keep the slot state as the breaker left it.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_trial();
        }
    }
}

/// Procore API circuit breaker.
pub struct CircuitBreaker {
    options: CircuitBreakerOptions,
    state: Mutex<CircuitBreakerState>,
    stats: Mutex<CircuitBreakerStats>,
}

impl CircuitBreaker {
    /// Create new circuit breaker.
    pub fn new(options: CircuitBreakerOptions) -> Self {
        Self {
            options,
            state: Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            stats: Mutex::new(CircuitBreakerStats::default()),
        }
    }

    /// Whether the breaker is enabled.
    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Whether `status` counts as a breaker failure.
    pub fn is_failure_status(status: u16) -> bool {
        CIRCUIT_BREAKING_STATUS_CODES.contains(&status)
    }

    /// Ask to send a request. An open circuit whose break has elapsed moves
    /// to half-open and admits exactly one trial, returned as [`Permit::Trial`].
    pub fn try_acquire(&self) -> (Permit, Option<Transition>) {
        // Lock order is state then stats throughout.
        let mut state = self.state.lock();
        let mut stats = self.stats.lock();
        stats.total_requests += 1;

        if !self.options.enabled {
            return (Permit::Allowed, None);
        }

        let mut transition = None;

        if state.state == CircuitState::Open {
            let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed >= self.options.duration_of_break {
                state.state = CircuitState::HalfOpen;
                state.trial_in_flight = false;
                stats.state_transitions += 1;
                transition = Some((CircuitState::Open, CircuitState::HalfOpen));
            } else {
                stats.rejected_requests += 1;
                return (
                    Permit::Rejected(self.options.duration_of_break - elapsed),
                    None,
                );
            }
        }

        if state.state == CircuitState::HalfOpen {
            if state.trial_in_flight {
                stats.rejected_requests += 1;
                return (Permit::Rejected(self.options.duration_of_break), transition);
            }
            state.trial_in_flight = true;
            return (Permit::Trial, transition);
        }

        (Permit::Allowed, transition)
    }

    /// Guard for a trial admitted by [`Self::try_acquire`].
    pub fn trial_guard(&self) -> TrialGuard<'_> {
        TrialGuard {
            breaker: self,
            armed: true,
        }
    }

    /// Record a successful request.
    pub fn record_success(&self) -> Option<Transition> {
        self.stats.lock().successful_requests += 1;
        if !self.options.enabled {
            return None;
        }

        let mut state = self.state.lock();
        state.failure_count = 0;
        match state.state {
            CircuitState::HalfOpen => {
                state.state = CircuitState::Closed;
                state.trial_in_flight = false;
                state.opened_at = None;
                self.stats.lock().state_transitions += 1;
                Some((CircuitState::HalfOpen, CircuitState::Closed))
            }
            _ => None,
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self) -> Option<Transition> {
        self.stats.lock().failed_requests += 1;
        if !self.options.enabled {
            return None;
        }

        let mut state = self.state.lock();
        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.options.failure_threshold {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    self.stats.lock().state_transitions += 1;
                    return Some((CircuitState::Closed, CircuitState::Open));
                }
                None
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.trial_in_flight = false;
                self.stats.lock().state_transitions += 1;
                Some((CircuitState::HalfOpen, CircuitState::Open))
            }
            CircuitState::Open => None,
        }
    }

    /// Release a half-open trial whose outcome was neither success nor failure.
    pub fn release_trial(&self) {
        let mut state = self.state.lock();
        if state.state == CircuitState::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    /// Get current state.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Force the circuit closed.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if state.state != CircuitState::Closed {
            self.stats.lock().state_transitions += 1;
        }
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.opened_at = None;
        state.trial_in_flight = false;
    }

    /// Get statistics.
    pub fn get_stats(&self) -> CircuitBreakerStats {
        self.stats.lock().clone()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerOptions::default())
    }
}
