//! Candidate endpoint resolution.
//!
//! Resolvers answer one question: which registry servers could this client
//! talk to right now? The built-in chain composes three layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       AsyncResolver                         │
//! │   Warm-up barrier │ Periodic refresh │ Published snapshot   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     CompositeResolver                       │
//! │   Warm local snapshot │ StalenessGate │ Fallback            │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │       SnapshotResolver       │        DefaultResolver       │
//! │   Local registry cache       │   Static list or DNS TXT     │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Absence of candidates is a normal transient condition: `resolve` returns
//! an empty set instead of an error, and failures are logged where they
//! occur.

use std::fmt;

use async_trait::async_trait;

use crate::endpoint::Endpoint;

mod background;
mod composite;
mod dns;
mod snapshot;

pub use background::{AsyncResolver, RefreshConfig};
pub use composite::{CompositeResolver, StalenessGate};
pub use dns::{DefaultResolver, DefaultResolverConfig};
pub use snapshot::{
    FileSnapshotSource, InstanceStatus, RegistrySnapshot, ServiceInstance, SnapshotResolver,
    SnapshotSource,
};

/// Produces the current set of candidate registry endpoints.
///
/// Implementations may perform network I/O (DNS) or read local state, but
/// must not cache or retry: staleness and refresh policy belong to the
/// wrappers above. An empty result means "no candidates known", never an
/// error.
#[async_trait]
pub trait ClusterResolver: Send + Sync + fmt::Debug {
    /// Resolves the current candidate set, in priority order, without
    /// duplicates.
    async fn resolve(&self) -> Vec<Endpoint>;
}
