//! Quarantine-aware failover across candidate endpoints.
//!
//! Each logical call walks the resolver's candidate set in priority order,
//! skipping endpoints currently quarantined, demoting failures into the
//! quarantine, and promoting an endpoint back out the moment it answers.
//! The quarantine is cleared wholesale — not pruned per entry — once it
//! covers the configured fraction of the full candidate set, so a cluster
//! that degraded and later recovered is never locked out permanently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use snafu::{ResultExt, ensure};

use crate::endpoint::Endpoint;
use crate::error::{
    AllCandidatesFailedSnafu, AllEndpointsQuarantinedSnafu, ClientError, NoCandidatesSnafu, Result,
};
use crate::metrics::{RequestOutcome, TransportMetrics, default_metrics};
use crate::resolver::AsyncResolver;
use crate::transport::{RegistryClient, RegistryRequest, RegistryResponse, RegistryTransport};

/// Transport decorator that retries across resolved endpoints with a
/// self-healing quarantine.
#[derive(Debug)]
pub struct RetryableClient {
    transport: Arc<dyn RegistryTransport>,
    resolver: Arc<AsyncResolver>,

    /// Endpoints excluded from selection after a failure. Mutated only here.
    quarantine: Mutex<HashSet<Endpoint>>,

    /// Fraction of the full candidate set at which the quarantine is cleared.
    quarantine_refresh_percentage: f64,

    metrics: Arc<dyn TransportMetrics>,
}

impl RetryableClient {
    /// Creates a retrying client over the given transport and resolver.
    #[must_use]
    pub fn new(
        transport: Arc<dyn RegistryTransport>,
        resolver: Arc<AsyncResolver>,
        quarantine_refresh_percentage: f64,
    ) -> Self {
        Self::new_with_metrics(
            transport,
            resolver,
            quarantine_refresh_percentage,
            default_metrics(),
        )
    }

    /// Like [`new`](Self::new), with an explicit metrics sink.
    #[must_use]
    pub fn new_with_metrics(
        transport: Arc<dyn RegistryTransport>,
        resolver: Arc<AsyncResolver>,
        quarantine_refresh_percentage: f64,
        metrics: Arc<dyn TransportMetrics>,
    ) -> Self {
        Self {
            transport,
            resolver,
            quarantine: Mutex::new(HashSet::new()),
            quarantine_refresh_percentage,
            metrics,
        }
    }

    /// Returns the current quarantine size.
    #[must_use]
    pub fn quarantine_len(&self) -> usize {
        self.quarantine.lock().len()
    }

    /// Computes the endpoints eligible for this pass.
    ///
    /// The quarantine is first intersected with the current candidate
    /// universe (endpoints that resolution no longer returns cannot stay
    /// quarantined), then either cleared wholesale when it covers the
    /// configured fraction of the universe, or subtracted from it.
    fn available_candidates(&self, candidates: &[Endpoint]) -> Result<Vec<Endpoint>> {
        let mut quarantine = self.quarantine.lock();
        quarantine.retain(|endpoint| candidates.contains(endpoint));

        if quarantine.is_empty() {
            return Ok(candidates.to_vec());
        }

        let quarantined = quarantine.len();
        if quarantined as f64 >= self.quarantine_refresh_percentage * candidates.len() as f64 {
            tracing::debug!(
                quarantined,
                candidates = candidates.len(),
                "quarantine reached the clear threshold; starting over with the full set"
            );
            quarantine.clear();
            self.metrics.record_quarantine_size(0);
            return Ok(candidates.to_vec());
        }

        let available: Vec<Endpoint> = candidates
            .iter()
            .filter(|endpoint| !quarantine.contains(endpoint))
            .cloned()
            .collect();
        ensure!(!available.is_empty(), AllEndpointsQuarantinedSnafu { count: quarantined });
        Ok(available)
    }

    async fn try_execute(&self, request: &RegistryRequest) -> Result<RegistryResponse> {
        let candidates = self.resolver.endpoints().await;
        ensure!(!candidates.is_empty(), NoCandidatesSnafu);

        let available = self.available_candidates(&candidates)?;
        let attempts = available.len();

        let mut last_error = None;
        for endpoint in available {
            match self.transport.send(&endpoint, request).await {
                Ok(response) => {
                    if self.quarantine.lock().remove(&endpoint) {
                        tracing::info!(
                            endpoint = %endpoint,
                            "endpoint answered again; removed from quarantine"
                        );
                    }
                    return Ok(response);
                },
                Err(error) => {
                    tracing::warn!(
                        endpoint = %endpoint,
                        error = %error,
                        "request failed; quarantining endpoint"
                    );
                    self.metrics.record_endpoint_failure(&endpoint.address());
                    let size = {
                        let mut quarantine = self.quarantine.lock();
                        quarantine.insert(endpoint);
                        quarantine.len()
                    };
                    self.metrics.record_quarantine_size(size);
                    last_error = Some(error);
                },
            }
        }

        match last_error {
            Some(source) => Err(source).context(AllCandidatesFailedSnafu { attempts }),
            // The available set is never empty here; candidates vanishing
            // mid-pass still leaves the last failure recorded above.
            None => NoCandidatesSnafu.fail(),
        }
    }
}

#[async_trait]
impl RegistryClient for RetryableClient {
    async fn execute(&self, request: &RegistryRequest) -> Result<RegistryResponse> {
        let started = Instant::now();
        let result = self.try_execute(request).await;
        let outcome = match &result {
            Ok(_) => RequestOutcome::Success,
            Err(ClientError::NoCandidates) => RequestOutcome::NoCandidates,
            Err(ClientError::AllEndpointsQuarantined { .. }) => RequestOutcome::AllQuarantined,
            Err(_) => RequestOutcome::Exhausted,
        };
        self.metrics.record_request(outcome, started.elapsed());
        result
    }
}
