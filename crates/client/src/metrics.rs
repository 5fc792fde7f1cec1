//! Client-side metrics for operational monitoring.
//!
//! A pluggable [`TransportMetrics`] trait with two implementations:
//!
//! - [`NoopTransportMetrics`]: zero-overhead default that discards everything.
//! - [`FacadeTransportMetrics`]: forwards to the [`metrics`](https://docs.rs/metrics)
//!   crate facade, so whatever recorder is installed (Prometheus, StatsD, ...)
//!   picks the values up.
//!
//! All metric names carry the `beacon_client_` prefix:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `beacon_client_requests_total` | Counter | `outcome` | Logical calls by final outcome |
//! | `beacon_client_request_duration_seconds` | Histogram | `outcome` | Call latency including failover |
//! | `beacon_client_endpoint_failures_total` | Counter | `endpoint` | Per-endpoint transport failures |
//! | `beacon_client_quarantine_size` | Gauge | — | Current quarantine set size |
//! | `beacon_client_session_rotations_total` | Counter | — | Forced delegate rotations |
//! | `beacon_client_resolver_refreshes_total` | Counter | `status` | Background resolution outcomes |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Final outcome of one logical `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A candidate answered successfully.
    Success,
    /// The resolver has never produced candidates.
    NoCandidates,
    /// Every known endpoint was quarantined below the clear threshold.
    AllQuarantined,
    /// Every candidate in the pass failed.
    Exhausted,
}

impl RequestOutcome {
    /// Stable label value for this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoCandidates => "no_candidates",
            Self::AllQuarantined => "all_quarantined",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for client-side metrics collection.
///
/// All methods have default no-op implementations, so an implementation only
/// overrides what it cares about. Implementations must be `Send + Sync`; one
/// instance is shared across all decorators and background tasks.
pub trait TransportMetrics: Send + Sync + fmt::Debug {
    /// Records the final outcome of one logical call, including failover time.
    fn record_request(&self, outcome: RequestOutcome, duration: Duration) {
        let _ = (outcome, duration);
    }

    /// Records a transport-level failure against one endpoint.
    fn record_endpoint_failure(&self, endpoint: &str) {
        let _ = endpoint;
    }

    /// Records the quarantine set size after a mutation.
    fn record_quarantine_size(&self, size: usize) {
        let _ = size;
    }

    /// Records a forced session rotation.
    fn record_session_rotation(&self) {}

    /// Records a background resolution pass and the published set size.
    fn record_refresh(&self, success: bool, endpoints: usize) {
        let _ = (success, endpoints);
    }
}

/// No-op metrics implementation with zero overhead.
#[derive(Debug, Clone, Copy)]
pub struct NoopTransportMetrics;

impl TransportMetrics for NoopTransportMetrics {}

/// Metrics implementation using the `metrics` crate facade.
#[derive(Debug, Clone, Copy)]
pub struct FacadeTransportMetrics;

/// Metric name constants for the `metrics` crate facade.
mod metric_names {
    /// Logical calls by final outcome.
    pub const REQUESTS_TOTAL: &str = "beacon_client_requests_total";
    /// Call latency distribution.
    pub const REQUEST_DURATION: &str = "beacon_client_request_duration_seconds";
    /// Per-endpoint transport failures.
    pub const ENDPOINT_FAILURES_TOTAL: &str = "beacon_client_endpoint_failures_total";
    /// Current quarantine set size.
    pub const QUARANTINE_SIZE: &str = "beacon_client_quarantine_size";
    /// Forced delegate rotations.
    pub const SESSION_ROTATIONS_TOTAL: &str = "beacon_client_session_rotations_total";
    /// Background resolution outcomes.
    pub const RESOLVER_REFRESHES_TOTAL: &str = "beacon_client_resolver_refreshes_total";
}

impl TransportMetrics for FacadeTransportMetrics {
    fn record_request(&self, outcome: RequestOutcome, duration: Duration) {
        metrics::counter!(metric_names::REQUESTS_TOTAL, "outcome" => outcome.as_str())
            .increment(1);
        metrics::histogram!(metric_names::REQUEST_DURATION, "outcome" => outcome.as_str())
            .record(duration.as_secs_f64());
    }

    fn record_endpoint_failure(&self, endpoint: &str) {
        metrics::counter!(
            metric_names::ENDPOINT_FAILURES_TOTAL,
            "endpoint" => endpoint.to_owned(),
        )
        .increment(1);
    }

    fn record_quarantine_size(&self, size: usize) {
        metrics::gauge!(metric_names::QUARANTINE_SIZE).set(size as f64);
    }

    fn record_session_rotation(&self) {
        metrics::counter!(metric_names::SESSION_ROTATIONS_TOTAL).increment(1);
    }

    fn record_refresh(&self, success: bool, endpoints: usize) {
        let status = if success { "success" } else { "failure" };
        metrics::counter!(metric_names::RESOLVER_REFRESHES_TOTAL, "status" => status)
            .increment(1);
        let _ = endpoints;
    }
}

/// Creates the default metrics instance (no-op).
pub(crate) fn default_metrics() -> Arc<dyn TransportMetrics> {
    Arc::new(NoopTransportMetrics)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    /// Test metrics that counts calls for verification.
    #[derive(Debug, Default)]
    pub(crate) struct CountingMetrics {
        pub(crate) requests: AtomicU64,
        pub(crate) endpoint_failures: AtomicU64,
        pub(crate) rotations: AtomicU64,
        pub(crate) refreshes: AtomicU64,
    }

    impl TransportMetrics for CountingMetrics {
        fn record_request(&self, _outcome: RequestOutcome, _duration: Duration) {
            self.requests.fetch_add(1, Ordering::Relaxed);
        }
        fn record_endpoint_failure(&self, _endpoint: &str) {
            self.endpoint_failures.fetch_add(1, Ordering::Relaxed);
        }
        fn record_session_rotation(&self) {
            self.rotations.fetch_add(1, Ordering::Relaxed);
        }
        fn record_refresh(&self, _success: bool, _endpoints: usize) {
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn noop_metrics_does_not_panic() {
        let metrics = NoopTransportMetrics;
        metrics.record_request(RequestOutcome::Success, Duration::from_millis(3));
        metrics.record_endpoint_failure("registry-1:8080");
        metrics.record_quarantine_size(2);
        metrics.record_session_rotation();
        metrics.record_refresh(true, 3);
    }

    #[test]
    fn facade_metrics_is_noop_without_recorder() {
        let metrics = FacadeTransportMetrics;
        metrics.record_request(RequestOutcome::Exhausted, Duration::from_millis(10));
        metrics.record_endpoint_failure("registry-1:8080");
        metrics.record_quarantine_size(0);
        metrics.record_session_rotation();
        metrics.record_refresh(false, 0);
    }

    #[test]
    fn counting_metrics_dispatches_through_trait_object() {
        let counting = Arc::new(CountingMetrics::default());
        let metrics: Arc<dyn TransportMetrics> = counting.clone();

        metrics.record_request(RequestOutcome::Success, Duration::from_millis(1));
        metrics.record_endpoint_failure("registry-1:8080");
        metrics.record_session_rotation();
        metrics.record_refresh(true, 2);

        assert_eq!(counting.requests.load(Ordering::Relaxed), 1);
        assert_eq!(counting.endpoint_failures.load(Ordering::Relaxed), 1);
        assert_eq!(counting.rotations.load(Ordering::Relaxed), 1);
        assert_eq!(counting.refreshes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(RequestOutcome::Success.as_str(), "success");
        assert_eq!(RequestOutcome::NoCandidates.as_str(), "no_candidates");
        assert_eq!(RequestOutcome::AllQuarantined.as_str(), "all_quarantined");
        assert_eq!(RequestOutcome::Exhausted.as_str(), "exhausted");
    }

    #[test]
    fn default_is_noop() {
        let metrics = default_metrics();
        metrics.record_request(RequestOutcome::Success, Duration::from_millis(1));
    }
}
