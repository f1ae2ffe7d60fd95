//! Dispatch counters.
//!
//! [`DispatchMetrics`] is shared between the dispatcher and its worker
//! coroutines through an `Arc`. All counters are relaxed atomics: they are
//! eventually consistent and never block a request.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Prometheus-compatible counters for the request lifecycle.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    requests: AtomicUsize,
    total_latency_ns: AtomicU64,
    decode_failures: AtomicUsize,
    unmatched_routes: AtomicUsize,
    timeouts: AtomicUsize,
    recovered_faults: AtomicUsize,
    late_results_discarded: AtomicUsize,
}

impl DispatchMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finalized request and its end-to-end latency.
    pub fn record_request(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.total_latency_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn inc_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unmatched_route(&self) {
        self.unmatched_routes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recovered_fault(&self) {
        self.recovered_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker finished after the deadline had claimed the response.
    pub fn inc_late_result_discarded(&self) {
        self.late_results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn decode_failures(&self) -> usize {
        self.decode_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn unmatched_routes(&self) -> usize {
        self.unmatched_routes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn recovered_faults(&self) -> usize {
        self.recovered_faults.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn late_results_discarded(&self) -> usize {
        self.late_results_discarded.load(Ordering::Relaxed)
    }

    /// Mean latency over every recorded request; zero before the first one.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.requests.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Render every counter in the Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let counters = [
            (
                "brrtdispatch_requests_total",
                "Total number of finalized requests",
                self.request_count(),
            ),
            (
                "brrtdispatch_decode_failures_total",
                "Requests rejected because they could not be decoded",
                self.decode_failures(),
            ),
            (
                "brrtdispatch_unmatched_routes_total",
                "Requests without a matching route",
                self.unmatched_routes(),
            ),
            (
                "brrtdispatch_timeouts_total",
                "Requests finalized by the response deadline",
                self.timeouts(),
            ),
            (
                "brrtdispatch_recovered_faults_total",
                "Panics recovered while serving requests",
                self.recovered_faults(),
            ),
            (
                "brrtdispatch_late_results_discarded_total",
                "Worker results dropped because the deadline finalized first",
                self.late_results_discarded(),
            ),
        ];

        let mut out = String::with_capacity(1024);
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        let _ = writeln!(
            out,
            "# HELP brrtdispatch_request_latency_seconds Average request latency in seconds"
        );
        let _ = writeln!(out, "# TYPE brrtdispatch_request_latency_seconds gauge");
        let _ = writeln!(
            out,
            "brrtdispatch_request_latency_seconds {}",
            self.average_latency().as_secs_f64()
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_latency() {
        let metrics = DispatchMetrics::new();
        assert_eq!(metrics.average_latency(), Duration::ZERO);
        metrics.record_request(Duration::from_millis(10));
        metrics.record_request(Duration::from_millis(30));
        assert_eq!(metrics.request_count(), 2);
        assert_eq!(metrics.average_latency(), Duration::from_millis(20));
    }

    #[test]
    fn test_render_prometheus() {
        let metrics = DispatchMetrics::new();
        metrics.inc_timeout();
        metrics.inc_timeout();
        metrics.inc_recovered_fault();
        let text = metrics.render_prometheus();
        assert!(text.contains("# TYPE brrtdispatch_timeouts_total counter"));
        assert!(text.contains("brrtdispatch_timeouts_total 2\n"));
        assert!(text.contains("brrtdispatch_recovered_faults_total 1\n"));
        assert!(text.contains("brrtdispatch_request_latency_seconds 0\n"));
    }
}
