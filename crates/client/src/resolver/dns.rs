//! Bootstrap resolution from static configuration or DNS.

use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::Resolver;
use parking_lot::RwLock;

use crate::endpoint::{dedup_endpoints, parse_endpoint_entry, Endpoint, DEFAULT_RELATIVE_URI};
use crate::resolver::ClusterResolver;

type DnsResolver = Resolver<TokioConnectionProvider>;

/// Configuration for the default (bootstrap) resolver.
#[derive(Debug, Clone, bon::Builder)]
#[builder(derive(Debug))]
pub struct DefaultResolverConfig {
    /// Static endpoint entries. When non-empty, DNS is bypassed.
    #[builder(default)]
    static_endpoints: Vec<String>,

    /// Cluster virtual address whose TXT record names the server hosts.
    #[builder(into)]
    cluster_address: Option<String>,

    /// Port applied to entries and DNS results that carry none.
    #[builder(default = 8080)]
    default_port: u16,

    /// Relative URI stamped onto every produced endpoint.
    #[builder(into, default = DEFAULT_RELATIVE_URI.to_owned())]
    relative_uri: String,
}

impl DefaultResolverConfig {
    /// Returns the static endpoint entries.
    #[must_use]
    pub fn static_endpoints(&self) -> &[String] {
        &self.static_endpoints
    }

    /// Returns the cluster virtual address, if configured.
    #[must_use]
    pub fn cluster_address(&self) -> Option<&str> {
        self.cluster_address.as_deref()
    }

    /// Returns the default port.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Returns the relative URI.
    #[must_use]
    pub fn relative_uri(&self) -> &str {
        &self.relative_uri
    }
}

/// Bootstrap resolver over a static host list or DNS TXT records.
///
/// With static entries configured, each `host[:port]` entry becomes one
/// endpoint. Otherwise the cluster address's TXT record is looked up; every
/// whitespace-separated name in it is resolved to its A/AAAA records, and
/// each resolved address becomes one endpoint in resolver-returned order.
#[derive(Debug)]
pub struct DefaultResolver {
    config: DefaultResolverConfig,

    /// DNS resolver, lazily initialized on first DNS resolution.
    dns: RwLock<Option<DnsResolver>>,
}

impl DefaultResolver {
    /// Creates a resolver from the given configuration.
    #[must_use]
    pub fn new(config: DefaultResolverConfig) -> Self {
        Self { config, dns: RwLock::new(None) }
    }

    fn resolve_static(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::with_capacity(self.config.static_endpoints.len());
        for entry in &self.config.static_endpoints {
            match parse_endpoint_entry(entry) {
                Ok((host, port, secure)) => {
                    endpoints.push(
                        Endpoint::new(host, port.unwrap_or(self.config.default_port))
                            .with_secure(secure)
                            .with_relative_uri(self.config.relative_uri.clone()),
                    );
                },
                Err(message) => {
                    tracing::warn!(entry = %entry, reason = %message, "skipping invalid endpoint entry");
                },
            }
        }
        endpoints
    }

    async fn resolve_dns(&self, cluster_address: &str) -> Vec<Endpoint> {
        let (txt_name, port, secure) = match parse_endpoint_entry(cluster_address) {
            Ok(parsed) => parsed,
            Err(message) => {
                tracing::warn!(
                    address = %cluster_address,
                    reason = %message,
                    "invalid cluster address; resolving no endpoints"
                );
                return Vec::new();
            },
        };
        let port = port.unwrap_or(self.config.default_port);

        let resolver = self.dns_resolver();

        let hosts = match resolver.txt_lookup(txt_name.clone()).await {
            Ok(lookup) => {
                let mut hosts = Vec::new();
                for record in lookup.iter() {
                    for data in record.txt_data() {
                        let text = String::from_utf8_lossy(data);
                        hosts.extend(text.split_whitespace().map(str::to_owned));
                    }
                }
                hosts
            },
            Err(error) => {
                tracing::warn!(
                    address = %txt_name,
                    error = %error,
                    "TXT lookup for cluster address failed; resolving no endpoints"
                );
                return Vec::new();
            },
        };

        if hosts.is_empty() {
            tracing::warn!(address = %txt_name, "TXT record named no server hosts");
            return Vec::new();
        }

        let mut endpoints = Vec::new();
        for host in hosts {
            match resolver.lookup_ip(host.clone()).await {
                Ok(lookup) => {
                    for address in lookup.iter() {
                        endpoints.push(
                            Endpoint::new(address.to_string(), port)
                                .with_secure(secure)
                                .with_relative_uri(self.config.relative_uri.clone()),
                        );
                    }
                },
                Err(error) => {
                    tracing::warn!(host = %host, error = %error, "address lookup failed; skipping host");
                },
            }
        }
        endpoints
    }

    /// Returns the DNS resolver, building it on first use.
    fn dns_resolver(&self) -> DnsResolver {
        {
            let guard = self.dns.read();
            if let Some(ref resolver) = *guard {
                return resolver.clone();
            }
        }

        let resolver = Resolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();

        let mut guard = self.dns.write();
        if guard.is_none() {
            *guard = Some(resolver.clone());
        }
        resolver
    }
}

#[async_trait]
impl ClusterResolver for DefaultResolver {
    async fn resolve(&self) -> Vec<Endpoint> {
        let endpoints = if !self.config.static_endpoints.is_empty() {
            self.resolve_static()
        } else if let Some(ref address) = self.config.cluster_address {
            self.resolve_dns(address).await
        } else {
            tracing::debug!("no static endpoints or cluster address configured");
            Vec::new()
        };
        dedup_endpoints(endpoints)
    }
}
