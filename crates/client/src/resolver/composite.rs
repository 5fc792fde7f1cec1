//! Staleness-gated composition of snapshot and bootstrap resolution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::resolver::{ClusterResolver, SnapshotResolver};

/// Decides whether a cached snapshot is still trustworthy for resolution.
#[derive(Debug, Clone, Copy)]
pub struct StalenessGate {
    threshold: Duration,
}

impl StalenessGate {
    /// Creates a gate with the given maximum tolerated age.
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Returns true when a snapshot of the given age may be used. The
    /// threshold itself is still warm.
    #[must_use]
    pub fn is_warm(&self, age: Duration) -> bool {
        age <= self.threshold
    }
}

/// Resolver preferring the warm local registry snapshot.
///
/// While the client's own registry cache is fresh enough, candidate servers
/// are taken from it — rerouting queries to whatever cluster the cache says
/// is healthy. An absent, stale, or empty-yielding snapshot falls back to the
/// wrapped default resolver, so a cold cache can never strand the client.
#[derive(Debug)]
pub struct CompositeResolver {
    cache: SnapshotResolver,
    fallback: Arc<dyn ClusterResolver>,
    gate: StalenessGate,
}

impl CompositeResolver {
    /// Creates a composite over a snapshot resolver and a fallback.
    #[must_use]
    pub fn new(
        cache: SnapshotResolver,
        fallback: Arc<dyn ClusterResolver>,
        gate: StalenessGate,
    ) -> Self {
        Self { cache, fallback, gate }
    }
}

#[async_trait]
impl ClusterResolver for CompositeResolver {
    async fn resolve(&self) -> Vec<Endpoint> {
        if let Some(snapshot) = self.cache.source().snapshot().await {
            let age = snapshot.age();
            if self.gate.is_warm(age) {
                let endpoints = self.cache.endpoints_from(&snapshot);
                if !endpoints.is_empty() {
                    tracing::debug!(
                        count = endpoints.len(),
                        age_secs = age.as_secs(),
                        "resolved endpoints from local registry snapshot"
                    );
                    return endpoints;
                }
                tracing::debug!("warm snapshot yielded no endpoints; using fallback resolver");
            } else {
                tracing::debug!(
                    age_secs = age.as_secs(),
                    threshold_secs = self.gate.threshold().as_secs(),
                    "local registry snapshot too stale; using fallback resolver"
                );
            }
        }
        self.fallback.resolve().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedResolver, StaticSnapshotSource};
    use crate::resolver::{InstanceStatus, ServiceInstance};

    fn up_instance(hostname: &str, vip: &str) -> ServiceInstance {
        ServiceInstance {
            instance_id: hostname.to_owned(),
            hostname: hostname.to_owned(),
            ip_address: None,
            port: 8080,
            secure: false,
            vip_address: Some(vip.to_owned()),
            status: InstanceStatus::Up,
        }
    }

    fn composite(
        source: Arc<StaticSnapshotSource>,
        fallback: ScriptedResolver,
        threshold: Duration,
    ) -> CompositeResolver {
        CompositeResolver::new(
            SnapshotResolver::new(source, "registry.write", false, "/v2/"),
            Arc::new(fallback),
            StalenessGate::new(threshold),
        )
    }

    #[test]
    fn gate_threshold_is_inclusive() {
        let gate = StalenessGate::new(Duration::from_secs(300));
        assert!(gate.is_warm(Duration::ZERO));
        assert!(gate.is_warm(Duration::from_secs(300)));
        assert!(!gate.is_warm(Duration::from_secs(301)));
    }

    #[tokio::test]
    async fn warm_snapshot_wins_over_fallback() {
        let source = Arc::new(StaticSnapshotSource::new());
        source.set_instances(vec![up_instance("cached-1", "registry.write")]);

        let fallback = ScriptedResolver::new(vec![Endpoint::new("fallback-1", 8080)]);
        let resolver = composite(Arc::clone(&source), fallback.clone(), Duration::from_secs(300));

        let endpoints = resolver.resolve().await;
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].host(), "cached-1");
        assert_eq!(fallback.resolve_count(), 0);
    }

    #[tokio::test]
    async fn stale_snapshot_falls_back() {
        let source = Arc::new(StaticSnapshotSource::new());
        source.set_instances(vec![up_instance("cached-1", "registry.write")]);
        // One second past the threshold.
        source.set_age(Duration::from_secs(301));

        let fallback = ScriptedResolver::new(vec![Endpoint::new("fallback-1", 8080)]);
        let resolver = composite(Arc::clone(&source), fallback.clone(), Duration::from_secs(300));

        let endpoints = resolver.resolve().await;
        assert_eq!(endpoints[0].host(), "fallback-1");
        assert_eq!(fallback.resolve_count(), 1);
    }

    #[tokio::test]
    async fn absent_snapshot_falls_back() {
        let source = Arc::new(StaticSnapshotSource::new());

        let fallback = ScriptedResolver::new(vec![Endpoint::new("fallback-1", 8080)]);
        let resolver = composite(source, fallback.clone(), Duration::from_secs(300));

        let endpoints = resolver.resolve().await;
        assert_eq!(endpoints[0].host(), "fallback-1");
    }

    #[tokio::test]
    async fn warm_snapshot_without_matching_instances_falls_back() {
        let source = Arc::new(StaticSnapshotSource::new());
        source.set_instances(vec![up_instance("cached-1", "some.other.vip")]);

        let fallback = ScriptedResolver::new(vec![Endpoint::new("fallback-1", 8080)]);
        let resolver = composite(source, fallback.clone(), Duration::from_secs(300));

        let endpoints = resolver.resolve().await;
        assert_eq!(endpoints[0].host(), "fallback-1");
        assert_eq!(fallback.resolve_count(), 1);
    }
}
