//! End-to-end assembly of the transport decorator chain.
//!
//! [`ClientBuilder`] wires configuration, a point-to-point transport, and an
//! optional local snapshot source into two ready client chains
//! (Sessioned → Retryable → Async → Composite/Default): one for
//! registration-style traffic against the write cluster, one for query
//! traffic that may target the read cluster independently.

use std::sync::Arc;

use crate::config::{BootstrapStrategy, TransportConfig};
use crate::metrics::{TransportMetrics, default_metrics};
use crate::resolver::{
    AsyncResolver, ClusterResolver, CompositeResolver, DefaultResolver, DefaultResolverConfig,
    RefreshConfig, SnapshotResolver, SnapshotSource, StalenessGate,
};
use crate::retry::RetryableClient;
use crate::session::SessionedClient;
use crate::transport::{RegistryClient, RegistryTransport};

/// Builder assembling the full registry client transport.
#[derive(Debug)]
pub struct ClientBuilder {
    config: TransportConfig,
    transport: Arc<dyn RegistryTransport>,
    snapshot_source: Option<Arc<dyn SnapshotSource>>,
    metrics: Arc<dyn TransportMetrics>,
}

impl ClientBuilder {
    /// Creates a builder over a validated configuration and a transport.
    #[must_use]
    pub fn new(config: TransportConfig, transport: Arc<dyn RegistryTransport>) -> Self {
        Self { config, transport, snapshot_source: None, metrics: default_metrics() }
    }

    /// Supplies the local registry snapshot reader backing the composite
    /// bootstrap strategy.
    #[must_use]
    pub fn with_snapshot_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.snapshot_source = Some(source);
        self
    }

    /// Supplies a metrics sink shared by every layer.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn TransportMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Assembles the client chains and starts their background resolvers.
    #[must_use]
    pub fn build(self) -> RegistryHandle {
        let config = self.config;
        let refresh_config = RefreshConfig::builder()
            .refresh_interval(config.async_refresh_interval())
            .warm_up_timeout(config.async_warm_up_timeout())
            .pool_size(config.async_executor_pool_size())
            .build();

        let bootstrap = bootstrap_resolver(&config, self.snapshot_source.as_ref());
        let bootstrap_resolver = Arc::new(AsyncResolver::new_with_metrics(
            bootstrap,
            refresh_config.clone(),
            Arc::clone(&self.metrics),
        ));

        let query_resolver = if config.use_bootstrap_resolver_for_query() {
            Arc::clone(&bootstrap_resolver)
        } else if let Some(read_address) = config.read_cluster_address() {
            let read = DefaultResolver::new(
                DefaultResolverConfig::builder()
                    .cluster_address(read_address)
                    .default_port(config.default_port())
                    .relative_uri(config.relative_uri())
                    .build(),
            );
            Arc::new(AsyncResolver::new_with_metrics(
                Arc::new(read),
                refresh_config,
                Arc::clone(&self.metrics),
            ))
        } else {
            tracing::debug!(
                "read-cluster address not configured; query traffic reuses the bootstrap resolver"
            );
            Arc::clone(&bootstrap_resolver)
        };

        let registration = Arc::new(session_over(
            Arc::clone(&self.transport),
            Arc::clone(&bootstrap_resolver),
            &config,
            Arc::clone(&self.metrics),
        ));
        let query = Arc::new(session_over(
            self.transport,
            Arc::clone(&query_resolver),
            &config,
            self.metrics,
        ));

        RegistryHandle { registration, query, bootstrap_resolver, query_resolver }
    }
}

/// Builds the bootstrap resolver for the configured strategy.
fn bootstrap_resolver(
    config: &TransportConfig,
    snapshot_source: Option<&Arc<dyn SnapshotSource>>,
) -> Arc<dyn ClusterResolver> {
    let default = Arc::new(DefaultResolver::new(
        DefaultResolverConfig::builder()
            .static_endpoints(config.static_endpoints().to_vec())
            .maybe_cluster_address(config.write_cluster_address().map(str::to_owned))
            .default_port(config.default_port())
            .relative_uri(config.relative_uri())
            .build(),
    ));

    if config.bootstrap_strategy() != BootstrapStrategy::Composite {
        return default;
    }

    match (snapshot_source, config.write_cluster_address()) {
        (Some(source), Some(vip)) => Arc::new(CompositeResolver::new(
            SnapshotResolver::new(
                Arc::clone(source),
                vip,
                config.resolver_use_ip(),
                config.relative_uri(),
            ),
            default,
            StalenessGate::new(config.cache_staleness_threshold()),
        )),
        _ => {
            tracing::warn!(
                "composite bootstrap strategy needs a snapshot source and a write-cluster \
                 address; using the default strategy"
            );
            default
        },
    }
}

/// Wraps a retryable client factory in a sessioned client.
fn session_over(
    transport: Arc<dyn RegistryTransport>,
    resolver: Arc<AsyncResolver>,
    config: &TransportConfig,
    metrics: Arc<dyn TransportMetrics>,
) -> SessionedClient {
    let percentage = config.quarantine_refresh_percentage();
    let factory_metrics = Arc::clone(&metrics);
    let factory = move || {
        Arc::new(RetryableClient::new_with_metrics(
            Arc::clone(&transport),
            Arc::clone(&resolver),
            percentage,
            Arc::clone(&factory_metrics),
        )) as Arc<dyn RegistryClient>
    };
    SessionedClient::new_with_metrics(factory, config.session_reconnect_interval(), metrics)
}

/// The assembled transport: two client chains and their resolvers.
#[derive(Debug)]
pub struct RegistryHandle {
    registration: Arc<SessionedClient>,
    query: Arc<SessionedClient>,
    bootstrap_resolver: Arc<AsyncResolver>,
    query_resolver: Arc<AsyncResolver>,
}

impl RegistryHandle {
    /// Returns the client for registration-style traffic (write cluster).
    #[must_use]
    pub fn registration_client(&self) -> Arc<dyn RegistryClient> {
        Arc::clone(&self.registration) as Arc<dyn RegistryClient>
    }

    /// Returns the client for query traffic.
    #[must_use]
    pub fn query_client(&self) -> Arc<dyn RegistryClient> {
        Arc::clone(&self.query) as Arc<dyn RegistryClient>
    }

    /// Returns the bootstrap resolver.
    #[must_use]
    pub fn bootstrap_resolver(&self) -> &Arc<AsyncResolver> {
        &self.bootstrap_resolver
    }

    /// Returns the resolver serving query traffic.
    #[must_use]
    pub fn query_resolver(&self) -> &Arc<AsyncResolver> {
        &self.query_resolver
    }

    /// Returns true when query traffic reuses the bootstrap resolver.
    #[must_use]
    pub fn reuses_bootstrap_resolver(&self) -> bool {
        Arc::ptr_eq(&self.bootstrap_resolver, &self.query_resolver)
    }

    /// Tears down both client chains and stops the background resolvers.
    pub fn shutdown(&self) {
        self.registration.shutdown();
        self.query.shutdown();
        self.bootstrap_resolver.shutdown();
        self.query_resolver.shutdown();
    }
}
