//! Transport boundary types and the capability seams the decorators compose.
//!
//! The wire protocol is not this crate's concern: callers plug in anything
//! implementing [`RegistryTransport`] (one point-to-point `send` with its own
//! timeout), and everything above it — quarantine retry, session rotation —
//! is expressed as [`RegistryClient`] decorators wrapping one instance of the
//! same capability.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::error::ClientError;

/// Method of a registry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    /// Read a resource.
    Get,
    /// Create a resource.
    Post,
    /// Replace or touch a resource.
    Put,
    /// Remove a resource.
    Delete,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// An opaque request against the registry service.
///
/// The transport layer does not interpret the path or body; it only carries
/// them to whichever endpoint the retry layer selects.
#[derive(Debug, Clone)]
pub struct RegistryRequest {
    method: RequestMethod,
    path: String,
    body: Option<Vec<u8>>,
}

impl RegistryRequest {
    /// Creates a request with the given method and service-relative path.
    #[must_use]
    pub fn new(method: RequestMethod, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None }
    }

    /// Shorthand for a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(RequestMethod::Get, path)
    }

    /// Attaches a request body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// Returns the service-relative path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// An opaque response from a registry server.
#[derive(Debug, Clone)]
pub struct RegistryResponse {
    status: u16,
    body: Option<Vec<u8>>,
}

impl RegistryResponse {
    /// Creates a response with the given status code and no body.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Attaches a response body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the response body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure of a single `send` to a single endpoint.
///
/// These never surface to callers directly: the retry layer quarantines the
/// endpoint and moves on, escalating only the last failure of an exhausted
/// pass inside [`ClientError::AllCandidatesFailed`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("failed to connect to {endpoint}: {message}")]
    Connect {
        /// `host:port` of the endpoint.
        endpoint: String,
        /// Underlying connect error description.
        message: String,
    },

    /// The transport's own timeout fired before a response arrived.
    #[error("request to {endpoint} timed out after {elapsed:?}")]
    Timeout {
        /// `host:port` of the endpoint.
        endpoint: String,
        /// How long the transport waited.
        elapsed: Duration,
    },

    /// The server answered with a 5xx-class status.
    #[error("server {endpoint} answered {status}")]
    Server {
        /// `host:port` of the endpoint.
        endpoint: String,
        /// The status code returned.
        status: u16,
    },
}

impl TransportError {
    /// Returns the `host:port` of the endpoint the failure occurred on.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Connect { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Server { endpoint, .. } => endpoint,
        }
    }
}

/// Point-to-point transport to a single registry server.
///
/// Implementations own their timeout; the retry layer treats a timeout
/// identically to a connection failure. A 5xx answer must be reported as
/// [`TransportError::Server`], not as a response — non-5xx statuses flow back
/// as responses for the caller to interpret.
#[async_trait]
pub trait RegistryTransport: Send + Sync + fmt::Debug {
    /// Sends one request to one endpoint.
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &RegistryRequest,
    ) -> Result<RegistryResponse, TransportError>;
}

/// The single capability exposed upward and wrapped by every decorator.
///
/// Callers see either a successful response or one of the surfaced
/// [`ClientError`] kinds, independent of which server ultimately answered.
#[async_trait]
pub trait RegistryClient: Send + Sync + fmt::Debug {
    /// Executes one logical call against the registry cluster.
    async fn execute(&self, request: &RegistryRequest) -> Result<RegistryResponse, ClientError>;

    /// Releases resources held by this client. Idempotent.
    fn shutdown(&self) {}
}
