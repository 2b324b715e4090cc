//! Mapping metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Call counts, timings and failures for one mapper, per direction.
#[derive(Debug, Default)]
pub struct MappingMetrics {
    to_domain_calls: AtomicU64,
    to_wire_calls: AtomicU64,
    to_domain_nanos: AtomicU64,
    to_wire_nanos: AtomicU64,
    to_domain_errors: AtomicU64,
    to_wire_errors: AtomicU64,
}

/// Point-in-time copy of [`MappingMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MappingMetricsSnapshot {
    pub to_domain_calls: u64,
    pub to_wire_calls: u64,
    pub to_domain_errors: u64,
    pub to_wire_errors: u64,
    pub average_to_domain_time: Duration,
    pub average_to_wire_time: Duration,
    pub to_domain_error_rate: f64,
    pub to_wire_error_rate: f64,
}

fn average(total_nanos: u64, calls: u64) -> Duration {
    if calls == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(total_nanos / calls)
    }
}

fn rate(errors: u64, calls: u64) -> f64 {
    if calls == 0 {
        0.0
    } else {
        errors as f64 / calls as f64
    }
}

impl MappingMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a wire to domain mapping.
    pub fn record_to_domain(&self, elapsed: Duration, success: bool) {
        self.to_domain_calls.fetch_add(1, Ordering::Relaxed);
        self.to_domain_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        if !success {
            self.to_domain_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a domain to wire mapping.
    pub fn record_to_wire(&self, elapsed: Duration, success: bool) {
        self.to_wire_calls.fetch_add(1, Ordering::Relaxed);
        self.to_wire_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        if !success {
            self.to_wire_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of the counters.
    pub fn snapshot(&self) -> MappingMetricsSnapshot {
        let to_domain_calls = self.to_domain_calls.load(Ordering::Relaxed);
        let to_wire_calls = self.to_wire_calls.load(Ordering::Relaxed);
        let to_domain_errors = self.to_domain_errors.load(Ordering::Relaxed);
        let to_wire_errors = self.to_wire_errors.load(Ordering::Relaxed);

        MappingMetricsSnapshot {
            to_domain_calls,
            to_wire_calls,
            to_domain_errors,
            to_wire_errors,
            average_to_domain_time: average(
                self.to_domain_nanos.load(Ordering::Relaxed),
                to_domain_calls,
            ),
            average_to_wire_time: average(self.to_wire_nanos.load(Ordering::Relaxed), to_wire_calls),
            to_domain_error_rate: rate(to_domain_errors, to_domain_calls),
            to_wire_error_rate: rate(to_wire_errors, to_wire_calls),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.to_domain_calls,
            &self.to_wire_calls,
            &self.to_domain_nanos,
            &self.to_wire_nanos,
            &self.to_domain_errors,
            &self.to_wire_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_averages_and_rates() {
        let metrics = MappingMetrics::new();
        metrics.record_to_domain(Duration::from_micros(10), true);
        metrics.record_to_domain(Duration::from_micros(30), false);
        metrics.record_to_wire(Duration::from_micros(5), true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.to_domain_calls, 2);
        assert_eq!(snapshot.average_to_domain_time, Duration::from_micros(20));
        assert_eq!(snapshot.to_domain_error_rate, 0.5);
        assert_eq!(snapshot.to_wire_error_rate, 0.0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MappingMetricsSnapshot::default());
    }
}
