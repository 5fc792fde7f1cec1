//! Controllable in-memory fakes for transport testing.
//!
//! This module provides programmable stand-ins for the external
//! collaborators — the point-to-point transport, a backing resolver, and the
//! local registry snapshot reader — so resilience behavior can be exercised
//! without servers or DNS.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use beacon_client::mock::{MockBehavior, MockTransport};
//! use beacon_client::{Endpoint, RegistryRequest, RegistryTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = MockTransport::new();
//! transport.set_behavior("registry-1:8080", MockBehavior::ReturnStatus(503));
//!
//! let endpoint = Endpoint::new("registry-1", 8080);
//! let result = transport.send(&endpoint, &RegistryRequest::get("apps/")).await;
//! assert!(result.is_err());
//! assert_eq!(transport.calls_to("registry-1:8080"), 1);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::endpoint::Endpoint;
use crate::resolver::{ClusterResolver, RegistrySnapshot, ServiceInstance, SnapshotSource};
use crate::transport::{
    RegistryRequest, RegistryResponse, RegistryTransport, RequestMethod, TransportError,
};

/// How the mock transport answers requests to one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Answer 200 with no body.
    Succeed,

    /// Fail as if the connection were refused.
    RefuseConnections,

    /// Fail as if the transport timeout fired.
    Timeout,

    /// Answer with the given status. 5xx statuses are reported as transport
    /// errors, anything else as a response.
    ReturnStatus(u16),
}

/// One recorded call against the mock transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// `host:port` of the targeted endpoint.
    pub endpoint: String,
    /// Request method.
    pub method: RequestMethod,
    /// Request path.
    pub path: String,
}

#[derive(Debug, Default)]
struct MockTransportState {
    behaviors: RwLock<HashMap<String, MockBehavior>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// Programmable in-memory transport.
///
/// Endpoints answer 200 unless a behavior was installed for their
/// `host:port` key. Clones share state, so a clone handed to the client can
/// be steered and inspected from the test.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<MockTransportState>,
}

impl MockTransport {
    /// Creates a transport where every endpoint succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a behavior for the endpoint with the given `host:port` key.
    pub fn set_behavior(&self, endpoint: impl Into<String>, behavior: MockBehavior) {
        self.state.behaviors.write().insert(endpoint.into(), behavior);
    }

    /// Returns every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    /// Returns the total number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }

    /// Returns the number of calls recorded against one `host:port` key.
    #[must_use]
    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.state.calls.lock().iter().filter(|call| call.endpoint == endpoint).count()
    }
}

#[async_trait]
impl RegistryTransport for MockTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &RegistryRequest,
    ) -> Result<RegistryResponse, TransportError> {
        let key = endpoint.address();
        self.state.calls.lock().push(RecordedCall {
            endpoint: key.clone(),
            method: request.method(),
            path: request.path().to_owned(),
        });

        let behavior =
            self.state.behaviors.read().get(&key).copied().unwrap_or(MockBehavior::Succeed);
        match behavior {
            MockBehavior::Succeed => Ok(RegistryResponse::new(200)),
            MockBehavior::RefuseConnections => Err(TransportError::Connect {
                endpoint: key,
                message: "connection refused".to_owned(),
            }),
            MockBehavior::Timeout => Err(TransportError::Timeout {
                endpoint: key,
                elapsed: Duration::from_secs(5),
            }),
            MockBehavior::ReturnStatus(status) if status >= 500 => {
                Err(TransportError::Server { endpoint: key, status })
            },
            MockBehavior::ReturnStatus(status) => Ok(RegistryResponse::new(status)),
        }
    }
}

#[derive(Debug)]
struct ScriptedState {
    endpoints: Mutex<Vec<Endpoint>>,
    delay: Mutex<Option<Duration>>,
    resolve_count: AtomicUsize,
}

/// Programmable resolver with an optional artificial delay.
///
/// Clones share state; tests hold one clone to steer resolution while the
/// client owns another.
#[derive(Debug, Clone)]
pub struct ScriptedResolver {
    state: Arc<ScriptedState>,
}

impl ScriptedResolver {
    /// Creates a resolver returning the given endpoints.
    #[must_use]
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            state: Arc::new(ScriptedState {
                endpoints: Mutex::new(endpoints),
                delay: Mutex::new(None),
                resolve_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Replaces the endpoints returned by future resolutions.
    pub fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        *self.state.endpoints.lock() = endpoints;
    }

    /// Delays every resolution by the given duration.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    /// Returns how many resolutions have run.
    #[must_use]
    pub fn resolve_count(&self) -> usize {
        self.state.resolve_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ClusterResolver for ScriptedResolver {
    async fn resolve(&self) -> Vec<Endpoint> {
        self.state.resolve_count.fetch_add(1, Ordering::Relaxed);
        let delay = *self.state.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.endpoints.lock().clone()
    }
}

#[derive(Debug, Default)]
struct StaticSnapshotState {
    instances: Mutex<Vec<ServiceInstance>>,
    last_updated: Mutex<Option<SystemTime>>,
}

/// Snapshot source with settable instances and age.
///
/// Returns `None` until instances are set, like a registry cache that has
/// never completed a fetch.
#[derive(Debug, Default)]
pub struct StaticSnapshotSource {
    state: StaticSnapshotState,
}

impl StaticSnapshotSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the snapshot contents, marking it freshly updated.
    pub fn set_instances(&self, instances: Vec<ServiceInstance>) {
        *self.state.instances.lock() = instances;
        *self.state.last_updated.lock() = Some(SystemTime::now());
    }

    /// Backdates the snapshot so it reads as `age` old.
    pub fn set_age(&self, age: Duration) {
        *self.state.last_updated.lock() = Some(SystemTime::now() - age);
    }
}

#[async_trait]
impl SnapshotSource for StaticSnapshotSource {
    async fn snapshot(&self) -> Option<RegistrySnapshot> {
        let last_updated = (*self.state.last_updated.lock())?;
        Some(RegistrySnapshot { instances: self.state.instances.lock().clone(), last_updated })
    }
}
