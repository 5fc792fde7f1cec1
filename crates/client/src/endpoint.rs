//! Candidate server endpoints.
//!
//! An [`Endpoint`] is an immutable value describing one registry server a
//! client may talk to. Endpoints compare by value; resolution produces them
//! fresh on every pass and the rest of the transport treats them as opaque
//! addresses.

use std::collections::HashSet;
use std::fmt;

/// Default relative URI under which the registry service is mounted.
pub const DEFAULT_RELATIVE_URI: &str = "/v2/";

/// Network address of one candidate registry server.
///
/// Equality and hashing are by value, so an endpoint re-resolved on a later
/// pass matches its earlier incarnation — quarantine bookkeeping depends on
/// this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    secure: bool,
    relative_uri: String,
}

impl Endpoint {
    /// Creates a plain (non-TLS) endpoint mounted at the default relative URI.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secure: false,
            relative_uri: DEFAULT_RELATIVE_URI.to_owned(),
        }
    }

    /// Sets whether the endpoint is reached over TLS.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the relative URI the registry service is mounted under.
    #[must_use]
    pub fn with_relative_uri(mut self, relative_uri: impl Into<String>) -> Self {
        self.relative_uri = relative_uri.into();
        self
    }

    /// Returns the host name or IP address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns whether the endpoint is reached over TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Returns the relative URI the registry service is mounted under.
    #[must_use]
    pub fn relative_uri(&self) -> &str {
        &self.relative_uri
    }

    /// Returns the `host:port` address, without scheme or path.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the full service URL for this endpoint.
    #[must_use]
    pub fn service_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let separator = if self.relative_uri.starts_with('/') { "" } else { "/" };
        format!("{scheme}://{}:{}{separator}{}", self.host, self.port, self.relative_uri)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Removes duplicate endpoints, keeping the first occurrence.
///
/// Resolution priority is insertion order, so the earliest appearance of an
/// endpoint wins.
pub(crate) fn dedup_endpoints(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut seen = HashSet::with_capacity(endpoints.len());
    endpoints.into_iter().filter(|endpoint| seen.insert(endpoint.clone())).collect()
}

/// Splits a configured endpoint entry into `(host, port, secure)`.
///
/// Accepts `host`, `host:port`, and the same forms with an `http://` or
/// `https://` prefix. A missing port is reported as `None` so the caller can
/// substitute its configured default. Bare IPv6 addresses without a port are
/// passed through unchanged.
pub(crate) fn parse_endpoint_entry(entry: &str) -> Result<(String, Option<u16>, bool), String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err("empty endpoint entry".to_owned());
    }

    let (rest, secure) = if let Some(stripped) = entry.strip_prefix("https://") {
        (stripped, true)
    } else if let Some(stripped) = entry.strip_prefix("http://") {
        (stripped, false)
    } else {
        (entry, false)
    };
    let rest = rest.trim_end_matches('/');

    if rest.is_empty() {
        return Err("endpoint entry has no host".to_owned());
    }
    if rest.contains(char::is_whitespace) {
        return Err("endpoint entry contains whitespace".to_owned());
    }

    // More than one colon means a bare IPv6 address; take it whole.
    if rest.matches(':').count() > 1 {
        return Ok((rest.to_owned(), None, secure));
    }

    match rest.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err("endpoint entry has no host".to_owned());
            }
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("invalid port '{port}' in endpoint entry"))?;
            Ok((host.to_owned(), Some(port), secure))
        },
        None => Ok((rest.to_owned(), None, secure)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn service_url_renders_scheme_and_uri() {
        let endpoint = Endpoint::new("registry-1.internal", 8080);
        assert_eq!(endpoint.service_url(), "http://registry-1.internal:8080/v2/");

        let secure = Endpoint::new("registry-1.internal", 443)
            .with_secure(true)
            .with_relative_uri("/registry/");
        assert_eq!(secure.service_url(), "https://registry-1.internal:443/registry/");
    }

    #[test]
    fn service_url_inserts_missing_slash() {
        let endpoint = Endpoint::new("10.0.0.1", 8080).with_relative_uri("v2/");
        assert_eq!(endpoint.service_url(), "http://10.0.0.1:8080/v2/");
    }

    #[test]
    fn equality_is_by_value() {
        let a = Endpoint::new("registry-1", 8080);
        let b = Endpoint::new("registry-1", 8080);
        let c = Endpoint::new("registry-1", 8081);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_is_host_port() {
        let endpoint = Endpoint::new("registry-1", 8080);
        assert_eq!(endpoint.to_string(), "registry-1:8080");
        assert_eq!(endpoint.address(), "registry-1:8080");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let endpoints = vec![
            Endpoint::new("a", 1),
            Endpoint::new("b", 2),
            Endpoint::new("a", 1),
            Endpoint::new("c", 3),
            Endpoint::new("b", 2),
        ];
        let deduped = dedup_endpoints(endpoints);
        assert_eq!(
            deduped,
            vec![Endpoint::new("a", 1), Endpoint::new("b", 2), Endpoint::new("c", 3)]
        );
    }

    #[test]
    fn parse_entry_host_only() {
        let (host, port, secure) = parse_endpoint_entry("registry-1.internal").unwrap();
        assert_eq!(host, "registry-1.internal");
        assert_eq!(port, None);
        assert!(!secure);
    }

    #[test]
    fn parse_entry_host_and_port() {
        let (host, port, secure) = parse_endpoint_entry("registry-1:9090").unwrap();
        assert_eq!(host, "registry-1");
        assert_eq!(port, Some(9090));
        assert!(!secure);
    }

    #[test]
    fn parse_entry_with_scheme() {
        let (host, port, secure) = parse_endpoint_entry("https://registry-1:443/").unwrap();
        assert_eq!(host, "registry-1");
        assert_eq!(port, Some(443));
        assert!(secure);

        let (host, port, secure) = parse_endpoint_entry("http://registry-2").unwrap();
        assert_eq!(host, "registry-2");
        assert_eq!(port, None);
        assert!(!secure);
    }

    #[test]
    fn parse_entry_ipv6_passes_through() {
        let (host, port, _) = parse_endpoint_entry("fd00::1").unwrap();
        assert_eq!(host, "fd00::1");
        assert_eq!(port, None);
    }

    #[test]
    fn parse_entry_rejects_garbage() {
        assert!(parse_endpoint_entry("").is_err());
        assert!(parse_endpoint_entry("   ").is_err());
        assert!(parse_endpoint_entry("host:not-a-port").is_err());
        assert!(parse_endpoint_entry(":8080").is_err());
        assert!(parse_endpoint_entry("host name:80").is_err());
    }
}
