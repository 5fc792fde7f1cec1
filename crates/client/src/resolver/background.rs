//! Background asynchronous resolution with a warm-up barrier.
//!
//! [`AsyncResolver`] keeps the endpoint set fresh without ever running
//! resolution on a caller's task: a background loop re-resolves on a fixed
//! interval and publishes each complete result by atomically replacing the
//! previous snapshot. Readers take an O(1) load of the published reference —
//! except during warm-up, when they suspend until the first resolution lands
//! or the warm-up timeout fires, whichever is first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore, watch};
use tokio::time::MissedTickBehavior;

use crate::endpoint::{Endpoint, dedup_endpoints};
use crate::metrics::{TransportMetrics, default_metrics};
use crate::resolver::ClusterResolver;

/// Default background resolution period (5 minutes).
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default warm-up blocking ceiling (5 seconds).
const DEFAULT_WARM_UP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default refresh worker pool size.
const DEFAULT_POOL_SIZE: usize = 5;

/// Cadence configuration for [`AsyncResolver`].
#[derive(Debug, Clone, bon::Builder)]
#[builder(derive(Debug))]
pub struct RefreshConfig {
    /// How often the wrapped resolver is invoked.
    #[builder(default = DEFAULT_REFRESH_INTERVAL)]
    refresh_interval: Duration,

    /// How long a caller may wait for the first resolution.
    #[builder(default = DEFAULT_WARM_UP_TIMEOUT)]
    warm_up_timeout: Duration,

    /// Maximum number of concurrently running refreshes.
    #[builder(default = DEFAULT_POOL_SIZE)]
    pool_size: usize,
}

impl RefreshConfig {
    /// Returns the background resolution period.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Returns the warm-up blocking ceiling.
    #[must_use]
    pub fn warm_up_timeout(&self) -> Duration {
        self.warm_up_timeout
    }

    /// Returns the refresh worker pool size.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

/// State shared between the resolver handle and its background task.
#[derive(Debug)]
struct Shared {
    inner: Arc<dyn ClusterResolver>,

    /// Published snapshot; replaced wholesale, never mutated in place.
    snapshot: ArcSwap<Vec<Endpoint>>,

    /// Flips to true once the first resolution pass has finished (or the
    /// resolver shut down before it could).
    warmed: watch::Sender<bool>,

    /// Bounds how many refreshes may run at once.
    workers: Arc<Semaphore>,

    shutdown: Notify,
    stopped: AtomicBool,

    last_refreshed: Mutex<Option<Instant>>,
    metrics: Arc<dyn TransportMetrics>,
}

impl Shared {
    async fn refresh_once(&self) {
        let resolved = dedup_endpoints(self.inner.resolve().await);
        if resolved.is_empty() {
            let retained = self.snapshot.load().len();
            tracing::warn!(
                retained,
                "resolution produced no endpoints; keeping last known snapshot"
            );
            self.metrics.record_refresh(false, retained);
            return;
        }

        let count = resolved.len();
        self.snapshot.store(Arc::new(resolved));
        *self.last_refreshed.lock() = Some(Instant::now());
        self.metrics.record_refresh(true, count);
        tracing::debug!(count, "published refreshed endpoint snapshot");
    }
}

/// Wraps any resolver with a background refresh loop and a warm-up barrier.
///
/// Construction spawns the background task, so an [`AsyncResolver`] must be
/// created inside a tokio runtime. [`shutdown`](Self::shutdown) (or dropping
/// the resolver) stops the task; reads afterwards still return the last
/// published snapshot.
#[derive(Debug)]
pub struct AsyncResolver {
    shared: Arc<Shared>,
    warm_up_timeout: Duration,
}

impl AsyncResolver {
    /// Creates the resolver and starts its background refresh task.
    #[must_use]
    pub fn new(inner: Arc<dyn ClusterResolver>, config: RefreshConfig) -> Self {
        Self::new_with_metrics(inner, config, default_metrics())
    }

    /// Like [`new`](Self::new), with an explicit metrics sink.
    #[must_use]
    pub fn new_with_metrics(
        inner: Arc<dyn ClusterResolver>,
        config: RefreshConfig,
        metrics: Arc<dyn TransportMetrics>,
    ) -> Self {
        let (warmed, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            inner,
            snapshot: ArcSwap::from_pointee(Vec::new()),
            warmed,
            workers: Arc::new(Semaphore::new(config.pool_size)),
            shutdown: Notify::new(),
            stopped: AtomicBool::new(false),
            last_refreshed: Mutex::new(None),
            metrics,
        });

        Self::spawn_refresh_loop(Arc::clone(&shared), config.refresh_interval);

        Self { shared, warm_up_timeout: config.warm_up_timeout }
    }

    fn spawn_refresh_loop(shared: Arc<Shared>, refresh_interval: Duration) {
        tokio::spawn(async move {
            // Warm-up pass: resolve once before entering the periodic loop,
            // then release any callers waiting on the barrier.
            shared.refresh_once().await;
            shared.warmed.send_replace(true);

            let mut ticker = tokio::time::interval(refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // consume the immediate first tick

            loop {
                if shared.stopped.load(Ordering::Relaxed) {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        match Arc::clone(&shared.workers).try_acquire_owned() {
                            Ok(permit) => {
                                let shared = Arc::clone(&shared);
                                tokio::spawn(async move {
                                    shared.refresh_once().await;
                                    drop(permit);
                                });
                            },
                            Err(_) => {
                                tracing::warn!("all refresh workers busy; skipping refresh tick");
                            },
                        }
                    }
                    _ = shared.shutdown.notified() => {
                        break;
                    }
                }
            }
            tracing::debug!("endpoint refresh task stopped");
        });
    }

    /// Returns the current endpoint snapshot.
    ///
    /// Before the first resolution completes, the caller suspends until it
    /// does or until the warm-up timeout elapses — on timeout, whatever
    /// snapshot exists (possibly empty) is returned rather than an error.
    /// Once warm, this is a non-blocking load of the published reference.
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        if !*self.shared.warmed.borrow() {
            let mut warmed = self.shared.warmed.subscribe();
            let waited = tokio::time::timeout(
                self.warm_up_timeout,
                warmed.wait_for(|warmed| *warmed),
            )
            .await;
            if waited.is_err() {
                tracing::warn!(
                    timeout_ms = self.warm_up_timeout.as_millis() as u64,
                    "warm-up timed out; proceeding with the current snapshot"
                );
            }
        }
        self.shared.snapshot.load_full().as_ref().clone()
    }

    /// Returns true once the first resolution pass has finished.
    #[must_use]
    pub fn is_warmed(&self) -> bool {
        *self.shared.warmed.borrow()
    }

    /// Returns when the snapshot was last successfully refreshed.
    #[must_use]
    pub fn last_refreshed_at(&self) -> Option<Instant> {
        *self.shared.last_refreshed.lock()
    }

    /// Stops the background task. Idempotent; reads afterwards return the
    /// last published snapshot, and warm-up waiters are released.
    pub fn shutdown(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            self.shared.shutdown.notify_waiters();
            self.shared.warmed.send_replace(true);
            tracing::debug!("async resolver shut down");
        }
    }
}

impl Drop for AsyncResolver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl ClusterResolver for AsyncResolver {
    async fn resolve(&self) -> Vec<Endpoint> {
        self.endpoints().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::ScriptedResolver;

    fn fast_config() -> RefreshConfig {
        RefreshConfig::builder()
            .refresh_interval(Duration::from_millis(50))
            .warm_up_timeout(Duration::from_secs(2))
            .build()
    }

    #[tokio::test]
    async fn warm_up_blocks_until_first_resolution() {
        let inner = ScriptedResolver::new(vec![Endpoint::new("registry-1", 8080)]);
        inner.set_delay(Duration::from_millis(100));

        let resolver = AsyncResolver::new(Arc::new(inner), fast_config());

        let started = Instant::now();
        let endpoints = resolver.endpoints().await;
        let elapsed = started.elapsed();

        assert_eq!(endpoints.len(), 1);
        assert!(
            elapsed >= Duration::from_millis(80),
            "reader returned after {elapsed:?}, before the first resolution completed"
        );
        assert!(resolver.is_warmed());
        assert!(resolver.last_refreshed_at().is_some());
    }

    #[tokio::test]
    async fn warm_up_timeout_releases_caller_with_empty_snapshot() {
        let inner = ScriptedResolver::new(vec![Endpoint::new("registry-1", 8080)]);
        inner.set_delay(Duration::from_millis(500));

        let config = RefreshConfig::builder()
            .refresh_interval(Duration::from_secs(60))
            .warm_up_timeout(Duration::from_millis(50))
            .build();
        let resolver = AsyncResolver::new(Arc::new(inner), config);

        let started = Instant::now();
        let endpoints = resolver.endpoints().await;
        let elapsed = started.elapsed();

        assert!(endpoints.is_empty());
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_millis(400));

        // Once the in-flight warm-up completes, the snapshot appears.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(resolver.endpoints().await.len(), 1);
    }

    #[tokio::test]
    async fn periodic_refresh_publishes_new_snapshot() {
        let inner = ScriptedResolver::new(vec![Endpoint::new("registry-1", 8080)]);
        let handle = inner.clone();
        let resolver = AsyncResolver::new(Arc::new(inner), fast_config());

        assert_eq!(resolver.endpoints().await.len(), 1);

        handle.set_endpoints(vec![
            Endpoint::new("registry-1", 8080),
            Endpoint::new("registry-2", 8080),
        ]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(resolver.endpoints().await.len(), 2);
    }

    #[tokio::test]
    async fn empty_refresh_keeps_last_good_snapshot() {
        let inner = ScriptedResolver::new(vec![Endpoint::new("registry-1", 8080)]);
        let handle = inner.clone();
        let resolver = AsyncResolver::new(Arc::new(inner), fast_config());

        assert_eq!(resolver.endpoints().await.len(), 1);

        handle.set_endpoints(Vec::new());
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Stale-but-nonempty is preferred over empty.
        assert_eq!(resolver.endpoints().await.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_never_contains_duplicates() {
        let inner = ScriptedResolver::new(vec![
            Endpoint::new("registry-1", 8080),
            Endpoint::new("registry-1", 8080),
        ]);
        let resolver = AsyncResolver::new(Arc::new(inner), fast_config());

        assert_eq!(resolver.endpoints().await.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_refreshing_and_keeps_snapshot() {
        let inner = ScriptedResolver::new(vec![Endpoint::new("registry-1", 8080)]);
        let handle = inner.clone();
        let resolver = AsyncResolver::new(Arc::new(inner), fast_config());

        assert_eq!(resolver.endpoints().await.len(), 1);
        resolver.shutdown();
        let count_at_shutdown = handle.resolve_count();

        handle.set_endpoints(vec![Endpoint::new("registry-2", 8080)]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // The loop has stopped: no further resolutions, old snapshot intact.
        assert!(handle.resolve_count() <= count_at_shutdown + 1);
        let endpoints = resolver.endpoints().await;
        assert_eq!(endpoints[0].host(), "registry-1");
    }

    #[tokio::test]
    async fn shutdown_releases_warm_up_waiters() {
        let inner = ScriptedResolver::new(vec![Endpoint::new("registry-1", 8080)]);
        inner.set_delay(Duration::from_secs(30));

        let config = RefreshConfig::builder()
            .refresh_interval(Duration::from_secs(60))
            .warm_up_timeout(Duration::from_secs(30))
            .build();
        let resolver = AsyncResolver::new(Arc::new(inner), config);

        resolver.shutdown();

        let started = Instant::now();
        let endpoints = resolver.endpoints().await;
        assert!(endpoints.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn refresh_config_defaults() {
        let config = RefreshConfig::builder().build();
        assert_eq!(config.refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.warm_up_timeout(), Duration::from_secs(5));
        assert_eq!(config.pool_size(), 5);
    }
}
