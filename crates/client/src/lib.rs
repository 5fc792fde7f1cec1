//! Client-side transport for the Beacon service registry.
//!
//! This crate lets a process locate and talk to one of several
//! interchangeable registry servers without a central load balancer,
//! surviving individual server outages and re-balancing load over time.
//!
//! # Features
//!
//! - **Pluggable bootstrap**: candidate servers from static configuration,
//!   DNS TXT records, or a warm locally cached registry snapshot
//! - **Self-healing quarantine**: failing endpoints are excluded from
//!   selection and readmitted the moment they answer, with a wholesale clear
//!   once too much of the cluster is excluded
//! - **Background resolution**: a warm-up barrier for the first lookup, then
//!   non-blocking reads of an atomically published endpoint snapshot
//! - **Session rotation**: long-lived delegates are periodically rebuilt so
//!   traffic never pins to one server indefinitely
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use beacon_client::{ClientBuilder, RegistryRequest, TransportConfig};
//!
//! # async fn example(transport: Arc<dyn beacon_client::RegistryTransport>) {
//! let config = TransportConfig::builder()
//!     .with_write_cluster_address("registry.example.com")
//!     .build()
//!     .expect("valid config");
//!
//! let handle = ClientBuilder::new(config, transport).build();
//!
//! let response = handle
//!     .registration_client()
//!     .execute(&RegistryRequest::get("apps/"))
//!     .await;
//! # let _ = response;
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SessionedClient                        │
//! │   Periodic delegate rotation │ Atomic session swap          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      RetryableClient                        │
//! │   Candidate iteration │ Quarantine │ Wholesale clear        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       AsyncResolver                         │
//! │   Warm-up barrier │ Background refresh │ Snapshot publish   │
//! ├─────────────────────────────────────────────────────────────┤
//! │              CompositeResolver / DefaultResolver            │
//! │   Warm local snapshot │ Static list │ DNS TXT → A records   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  RegistryTransport (yours)                  │
//! │   One point-to-point send with its own timeout              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod endpoint;
mod error;
mod factory;
mod metrics;
pub mod mock;
pub mod resolver;
mod retry;
mod session;
mod transport;

pub use config::{BootstrapStrategy, TransportConfig, TransportConfigBuilder};
pub use endpoint::{DEFAULT_RELATIVE_URI, Endpoint};
pub use error::{ClientError, Result};
pub use factory::{ClientBuilder, RegistryHandle};
pub use metrics::{
    FacadeTransportMetrics, NoopTransportMetrics, RequestOutcome, TransportMetrics,
};
pub use resolver::{
    AsyncResolver, ClusterResolver, CompositeResolver, DefaultResolver, DefaultResolverConfig,
    FileSnapshotSource, InstanceStatus, RefreshConfig, RegistrySnapshot, ServiceInstance,
    SnapshotResolver, SnapshotSource, StalenessGate,
};
pub use retry::RetryableClient;
pub use session::{ClientFactory, SessionedClient};
pub use transport::{
    RegistryClient, RegistryRequest, RegistryResponse, RegistryTransport, RequestMethod,
    TransportError,
};
