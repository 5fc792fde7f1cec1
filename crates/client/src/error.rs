//! Surfaced error taxonomy.
//!
//! Expected unavailability — a failed resolution, a quarantined endpoint, a
//! single dead server — is handled inside the transport and never raised.
//! Callers of `execute` see exactly three failure kinds: the resolver has
//! never produced candidates, every known endpoint is quarantined below the
//! clear threshold, or every candidate in the pass failed. Each is
//! distinguishable so callers can decide to fail fast or degrade.

use snafu::Snafu;

use crate::transport::TransportError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced to callers of the registry client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    /// The resolver has never produced a non-empty endpoint set.
    #[snafu(display("no known registry endpoints; resolution has not produced any candidates"))]
    NoCandidates,

    /// Every known endpoint is quarantined and the clear threshold was not met.
    #[snafu(display("all {count} known registry endpoints are quarantined"))]
    AllEndpointsQuarantined {
        /// Number of quarantined endpoints.
        count: usize,
    },

    /// Every candidate in this pass failed at the transport level.
    #[snafu(display("all {attempts} candidate endpoints failed; last error: {source}"))]
    AllCandidatesFailed {
        /// Number of endpoints tried in this pass.
        attempts: usize,
        /// The last per-endpoint failure observed.
        source: TransportError,
    },

    /// Configuration validation failed.
    #[snafu(display("configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// A configured endpoint or cluster address could not be parsed.
    #[snafu(display("invalid address '{address}': {message}"))]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// Parse error description.
        message: String,
    },
}

impl ClientError {
    /// Returns true when the failure is transient and a later call may
    /// succeed without reconfiguration.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NoCandidates
            | Self::AllEndpointsQuarantined { .. }
            | Self::AllCandidatesFailed { .. } => true,
            Self::Config { .. } | Self::InvalidAddress { .. } => false,
        }
    }

    /// Returns the last per-endpoint transport failure, if this error wraps one.
    #[must_use]
    pub fn last_transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::AllCandidatesFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
