//! Transport configuration with builder pattern.
//!
//! Covers the full transport surface: session rotation, quarantine policy,
//! local-cache staleness, async resolution cadence, and the write/read
//! cluster addresses the bootstrap and query resolvers target.

use std::str::FromStr;
use std::time::Duration;

use snafu::ensure;

use crate::endpoint::{DEFAULT_RELATIVE_URI, parse_endpoint_entry};
use crate::error::{ConfigSnafu, InvalidAddressSnafu, Result};

/// Default session reconnect interval (20 minutes).
const DEFAULT_SESSION_RECONNECT_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// Default quarantine clear percentage.
const DEFAULT_QUARANTINE_REFRESH_PERCENTAGE: f64 = 0.66;

/// Default local-cache staleness threshold (5 minutes).
const DEFAULT_CACHE_STALENESS_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Default async resolver refresh interval (5 minutes).
const DEFAULT_ASYNC_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default async resolver warm-up timeout (5 seconds).
const DEFAULT_ASYNC_WARM_UP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default async resolver worker pool size.
const DEFAULT_ASYNC_EXECUTOR_POOL_SIZE: usize = 5;

/// Default port for endpoints configured or resolved without one.
const DEFAULT_PORT: u16 = 8080;

/// Bootstrap resolution strategy.
///
/// Selected once from static configuration; never re-evaluated per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapStrategy {
    /// Resolve from the configured host list or DNS TXT records.
    #[default]
    Default,

    /// Resolve from the local registry snapshot while it is warm, falling
    /// back to the default strategy otherwise.
    Composite,
}

impl FromStr for BootstrapStrategy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "composite" => Ok(Self::Composite),
            other => Err(format!("unknown bootstrap strategy '{other}'")),
        }
    }
}

/// Configuration for the registry client transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub(crate) session_reconnect_interval: Duration,
    pub(crate) quarantine_refresh_percentage: f64,
    pub(crate) cache_staleness_threshold: Duration,
    pub(crate) resolver_use_ip: bool,
    pub(crate) async_refresh_interval: Duration,
    pub(crate) async_warm_up_timeout: Duration,
    pub(crate) async_executor_pool_size: usize,
    pub(crate) write_cluster_address: Option<String>,
    pub(crate) read_cluster_address: Option<String>,
    pub(crate) bootstrap_strategy: BootstrapStrategy,
    pub(crate) use_bootstrap_resolver_for_query: bool,
    pub(crate) static_endpoints: Vec<String>,
    pub(crate) default_port: u16,
    pub(crate) relative_uri: String,
}

impl TransportConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }

    /// Returns the session rotation period.
    #[must_use]
    pub fn session_reconnect_interval(&self) -> Duration {
        self.session_reconnect_interval
    }

    /// Returns the quarantine clear percentage in `[0.0, 1.0]`.
    #[must_use]
    pub fn quarantine_refresh_percentage(&self) -> f64 {
        self.quarantine_refresh_percentage
    }

    /// Returns the maximum age at which the local registry snapshot is still
    /// trusted for resolution.
    #[must_use]
    pub fn cache_staleness_threshold(&self) -> Duration {
        self.cache_staleness_threshold
    }

    /// Returns whether snapshot-derived endpoints use IP addresses instead of
    /// hostnames.
    #[must_use]
    pub fn resolver_use_ip(&self) -> bool {
        self.resolver_use_ip
    }

    /// Returns the background resolution period.
    #[must_use]
    pub fn async_refresh_interval(&self) -> Duration {
        self.async_refresh_interval
    }

    /// Returns how long a caller may block waiting for the first resolution.
    #[must_use]
    pub fn async_warm_up_timeout(&self) -> Duration {
        self.async_warm_up_timeout
    }

    /// Returns the bounded refresh worker pool size.
    #[must_use]
    pub fn async_executor_pool_size(&self) -> usize {
        self.async_executor_pool_size
    }

    /// Returns the write-cluster virtual address, if configured.
    #[must_use]
    pub fn write_cluster_address(&self) -> Option<&str> {
        self.write_cluster_address.as_deref()
    }

    /// Returns the read-cluster virtual address, if configured.
    #[must_use]
    pub fn read_cluster_address(&self) -> Option<&str> {
        self.read_cluster_address.as_deref()
    }

    /// Returns the bootstrap resolution strategy.
    #[must_use]
    pub fn bootstrap_strategy(&self) -> BootstrapStrategy {
        self.bootstrap_strategy
    }

    /// Returns whether query traffic reuses the bootstrap resolver.
    #[must_use]
    pub fn use_bootstrap_resolver_for_query(&self) -> bool {
        self.use_bootstrap_resolver_for_query
    }

    /// Returns the statically configured endpoint entries.
    #[must_use]
    pub fn static_endpoints(&self) -> &[String] {
        &self.static_endpoints
    }

    /// Returns the port applied to endpoints configured or resolved without one.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Returns the relative URI the registry service is mounted under.
    #[must_use]
    pub fn relative_uri(&self) -> &str {
        &self.relative_uri
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Default)]
pub struct TransportConfigBuilder {
    session_reconnect_interval: Option<Duration>,
    quarantine_refresh_percentage: Option<f64>,
    cache_staleness_threshold: Option<Duration>,
    resolver_use_ip: bool,
    async_refresh_interval: Option<Duration>,
    async_warm_up_timeout: Option<Duration>,
    async_executor_pool_size: Option<usize>,
    write_cluster_address: Option<String>,
    read_cluster_address: Option<String>,
    bootstrap_strategy: Option<BootstrapStrategy>,
    use_bootstrap_resolver_for_query: Option<bool>,
    static_endpoints: Vec<String>,
    default_port: Option<u16>,
    relative_uri: Option<String>,
}

impl TransportConfigBuilder {
    /// Sets the session rotation period.
    ///
    /// Default: 20 minutes.
    #[must_use]
    pub fn with_session_reconnect_interval(mut self, interval: Duration) -> Self {
        self.session_reconnect_interval = Some(interval);
        self
    }

    /// Sets the quarantine clear percentage.
    ///
    /// When the quarantined fraction of the full candidate set reaches this
    /// value, the quarantine is cleared wholesale. Default: 0.66.
    #[must_use]
    pub fn with_quarantine_refresh_percentage(mut self, percentage: f64) -> Self {
        self.quarantine_refresh_percentage = Some(percentage);
        self
    }

    /// Sets the local-cache staleness threshold.
    ///
    /// Default: 5 minutes.
    #[must_use]
    pub fn with_cache_staleness_threshold(mut self, threshold: Duration) -> Self {
        self.cache_staleness_threshold = Some(threshold);
        self
    }

    /// Extracts IP addresses instead of hostnames from the local snapshot.
    ///
    /// Default: false.
    #[must_use]
    pub fn with_resolver_use_ip(mut self, use_ip: bool) -> Self {
        self.resolver_use_ip = use_ip;
        self
    }

    /// Sets the background resolution period.
    ///
    /// Default: 5 minutes.
    #[must_use]
    pub fn with_async_refresh_interval(mut self, interval: Duration) -> Self {
        self.async_refresh_interval = Some(interval);
        self
    }

    /// Sets the warm-up blocking ceiling.
    ///
    /// Default: 5 seconds.
    #[must_use]
    pub fn with_async_warm_up_timeout(mut self, timeout: Duration) -> Self {
        self.async_warm_up_timeout = Some(timeout);
        self
    }

    /// Sets the refresh worker pool size.
    ///
    /// Default: 5.
    #[must_use]
    pub fn with_async_executor_pool_size(mut self, size: usize) -> Self {
        self.async_executor_pool_size = Some(size);
        self
    }

    /// Sets the write-cluster virtual address the bootstrap resolver targets.
    #[must_use]
    pub fn with_write_cluster_address(mut self, address: impl Into<String>) -> Self {
        self.write_cluster_address = Some(address.into());
        self
    }

    /// Sets the read-cluster virtual address used when query traffic is
    /// routed separately from bootstrap.
    #[must_use]
    pub fn with_read_cluster_address(mut self, address: impl Into<String>) -> Self {
        self.read_cluster_address = Some(address.into());
        self
    }

    /// Sets the bootstrap resolution strategy.
    ///
    /// Default: [`BootstrapStrategy::Default`].
    #[must_use]
    pub fn with_bootstrap_strategy(mut self, strategy: BootstrapStrategy) -> Self {
        self.bootstrap_strategy = Some(strategy);
        self
    }

    /// Controls whether query traffic reuses the bootstrap resolver.
    ///
    /// Default: true.
    #[must_use]
    pub fn with_use_bootstrap_resolver_for_query(mut self, reuse: bool) -> Self {
        self.use_bootstrap_resolver_for_query = Some(reuse);
        self
    }

    /// Sets a static list of endpoint entries (`host`, `host:port`, or with
    /// an `http(s)://` prefix). When non-empty, DNS resolution is bypassed.
    #[must_use]
    pub fn with_static_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a single static endpoint entry.
    #[must_use]
    pub fn with_static_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.static_endpoints.push(endpoint.into());
        self
    }

    /// Sets the port applied to endpoints configured or resolved without one.
    ///
    /// Default: 8080.
    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }

    /// Sets the relative URI the registry service is mounted under.
    ///
    /// Default: `/v2/`.
    #[must_use]
    pub fn with_relative_uri(mut self, relative_uri: impl Into<String>) -> Self {
        self.relative_uri = Some(relative_uri.into());
        self
    }

    /// Builds the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - neither static endpoints nor a write-cluster address is configured
    /// - the quarantine percentage is outside `[0.0, 1.0]`
    /// - any interval, timeout, pool size, or port is zero
    /// - a static endpoint entry does not parse
    pub fn build(self) -> Result<TransportConfig> {
        let quarantine_refresh_percentage =
            self.quarantine_refresh_percentage.unwrap_or(DEFAULT_QUARANTINE_REFRESH_PERCENTAGE);
        ensure!(
            (0.0..=1.0).contains(&quarantine_refresh_percentage),
            ConfigSnafu {
                message: format!(
                    "quarantine refresh percentage must be within [0.0, 1.0], got \
                     {quarantine_refresh_percentage}"
                ),
            }
        );

        let session_reconnect_interval =
            self.session_reconnect_interval.unwrap_or(DEFAULT_SESSION_RECONNECT_INTERVAL);
        ensure!(
            !session_reconnect_interval.is_zero(),
            ConfigSnafu { message: "session reconnect interval cannot be zero" }
        );

        let async_refresh_interval =
            self.async_refresh_interval.unwrap_or(DEFAULT_ASYNC_REFRESH_INTERVAL);
        ensure!(
            !async_refresh_interval.is_zero(),
            ConfigSnafu { message: "async refresh interval cannot be zero" }
        );

        let async_warm_up_timeout =
            self.async_warm_up_timeout.unwrap_or(DEFAULT_ASYNC_WARM_UP_TIMEOUT);
        ensure!(
            !async_warm_up_timeout.is_zero(),
            ConfigSnafu { message: "async warm-up timeout cannot be zero" }
        );

        let async_executor_pool_size =
            self.async_executor_pool_size.unwrap_or(DEFAULT_ASYNC_EXECUTOR_POOL_SIZE);
        ensure!(
            async_executor_pool_size >= 1,
            ConfigSnafu { message: "async executor pool size must be at least 1" }
        );

        let default_port = self.default_port.unwrap_or(DEFAULT_PORT);
        ensure!(default_port != 0, ConfigSnafu { message: "default port cannot be zero" });

        let relative_uri = self.relative_uri.unwrap_or_else(|| DEFAULT_RELATIVE_URI.to_owned());
        ensure!(
            !relative_uri.is_empty(),
            ConfigSnafu { message: "relative URI cannot be empty" }
        );

        ensure!(
            !self.static_endpoints.is_empty() || self.write_cluster_address.is_some(),
            ConfigSnafu {
                message: "either static endpoints or a write-cluster address is required",
            }
        );

        for entry in &self.static_endpoints {
            if let Err(message) = parse_endpoint_entry(entry) {
                return InvalidAddressSnafu { address: entry.clone(), message }.fail();
            }
        }

        Ok(TransportConfig {
            session_reconnect_interval,
            quarantine_refresh_percentage,
            cache_staleness_threshold: self
                .cache_staleness_threshold
                .unwrap_or(DEFAULT_CACHE_STALENESS_THRESHOLD),
            resolver_use_ip: self.resolver_use_ip,
            async_refresh_interval,
            async_warm_up_timeout,
            async_executor_pool_size,
            write_cluster_address: self.write_cluster_address,
            read_cluster_address: self.read_cluster_address,
            bootstrap_strategy: self.bootstrap_strategy.unwrap_or_default(),
            use_bootstrap_resolver_for_query: self.use_bootstrap_resolver_for_query.unwrap_or(true),
            static_endpoints: self.static_endpoints,
            default_port,
            relative_uri,
        })
    }
}
