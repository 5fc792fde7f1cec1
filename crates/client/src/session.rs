//! Bounded-lifetime client sessions.
//!
//! A long-lived sticky connection biases load toward whichever server
//! answered first. [`SessionedClient`] bounds how long any one resolved
//! delegate is used: on every call it checks the active session's age and,
//! past the reconnect interval, swaps in a freshly built delegate — which
//! re-runs resolution — before dispatching. Rotation spreads load and picks
//! up newly available servers without any health-checking at this layer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::metrics::{TransportMetrics, default_metrics};
use crate::transport::{RegistryClient, RegistryRequest, RegistryResponse};

/// Produces fresh delegate clients for [`SessionedClient`].
///
/// The factory re-runs whatever wiring built the previous delegate, so a new
/// session starts from current resolution state.
pub trait ClientFactory: Send + Sync {
    /// Builds a new delegate client.
    fn new_client(&self) -> Arc<dyn RegistryClient>;
}

impl<F> ClientFactory for F
where
    F: Fn() -> Arc<dyn RegistryClient> + Send + Sync,
{
    fn new_client(&self) -> Arc<dyn RegistryClient> {
        self()
    }
}

/// One bounded-lifetime binding to a delegate client.
struct Session {
    delegate: Arc<dyn RegistryClient>,
    created_at: Instant,
}

/// Transport decorator that periodically replaces its delegate.
pub struct SessionedClient {
    factory: Box<dyn ClientFactory>,
    reconnect_interval: Duration,

    /// The active session; replaced wholesale, never mutated in place.
    session: RwLock<Session>,

    rotations: AtomicU64,
    metrics: Arc<dyn TransportMetrics>,
}

impl SessionedClient {
    /// Creates a sessioned client, building the first delegate immediately.
    #[must_use]
    pub fn new(factory: impl ClientFactory + 'static, reconnect_interval: Duration) -> Self {
        Self::new_with_metrics(factory, reconnect_interval, default_metrics())
    }

    /// Like [`new`](Self::new), with an explicit metrics sink.
    #[must_use]
    pub fn new_with_metrics(
        factory: impl ClientFactory + 'static,
        reconnect_interval: Duration,
        metrics: Arc<dyn TransportMetrics>,
    ) -> Self {
        let delegate = factory.new_client();
        Self {
            factory: Box::new(factory),
            reconnect_interval,
            session: RwLock::new(Session { delegate, created_at: Instant::now() }),
            rotations: AtomicU64::new(0),
            metrics,
        }
    }

    /// Returns how many times the delegate has been rotated.
    #[must_use]
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Returns the configured rotation period.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    /// Returns the delegate for this call, rotating first if the active
    /// session has outlived the reconnect interval.
    fn current_delegate(&self) -> Arc<dyn RegistryClient> {
        {
            let session = self.session.read();
            if session.created_at.elapsed() < self.reconnect_interval {
                return Arc::clone(&session.delegate);
            }
        }

        let old_delegate;
        let new_delegate;
        {
            let mut session = self.session.write();
            // Another caller may have rotated while we waited for the lock.
            if session.created_at.elapsed() < self.reconnect_interval {
                return Arc::clone(&session.delegate);
            }
            new_delegate = self.factory.new_client();
            let previous = std::mem::replace(
                &mut *session,
                Session { delegate: Arc::clone(&new_delegate), created_at: Instant::now() },
            );
            old_delegate = previous.delegate;
        }

        // Release the old delegate outside the lock; in-flight calls holding
        // their own Arc complete against it undisturbed.
        old_delegate.shutdown();
        let rotation = self.rotations.fetch_add(1, Ordering::Relaxed) + 1;
        self.metrics.record_session_rotation();
        tracing::debug!(rotation, "session expired; delegate replaced");

        new_delegate
    }
}

#[async_trait]
impl RegistryClient for SessionedClient {
    async fn execute(&self, request: &RegistryRequest) -> Result<RegistryResponse> {
        self.current_delegate().execute(request).await
    }

    fn shutdown(&self) {
        self.session.read().delegate.shutdown();
    }
}

impl fmt::Debug for SessionedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionedClient")
            .field("reconnect_interval", &self.reconnect_interval)
            .field("rotations", &self.rotations.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
