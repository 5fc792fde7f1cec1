//! Resolution from a locally cached registry snapshot.
//!
//! A client that already holds a registry snapshot (from an earlier fetch)
//! can derive candidate endpoints from it instead of going back to DNS: the
//! instances carrying the configured virtual address are themselves the
//! servers to talk to. The snapshot reader is an external collaborator,
//! modeled by [`SnapshotSource`]; staleness policy lives in the composite
//! layer, not here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;

use crate::endpoint::{dedup_endpoints, Endpoint};
use crate::resolver::ClusterResolver;

/// Reported status of a registered service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    /// Instance is serving traffic.
    Up,
    /// Instance is registered but not serving.
    Down,
}

/// One service instance from the local registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceInstance {
    /// Unique instance identifier.
    pub instance_id: String,

    /// Public hostname of the instance.
    pub hostname: String,

    /// IP address, when the registry recorded one.
    #[serde(default)]
    pub ip_address: Option<String>,

    /// Service port.
    pub port: u16,

    /// Whether the instance is reached over TLS.
    #[serde(default)]
    pub secure: bool,

    /// Virtual addresses the instance serves, comma-separated.
    #[serde(default)]
    pub vip_address: Option<String>,

    /// Instance status.
    #[serde(default = "default_status")]
    pub status: InstanceStatus,
}

fn default_status() -> InstanceStatus {
    InstanceStatus::Up
}

impl ServiceInstance {
    /// Returns true if the instance serves the given virtual address.
    #[must_use]
    pub fn serves_vip(&self, vip: &str) -> bool {
        self.vip_address
            .as_deref()
            .is_some_and(|addresses| addresses.split(',').any(|entry| entry.trim() == vip))
    }
}

/// A point-in-time view of the locally cached registry contents.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Registered instances.
    pub instances: Vec<ServiceInstance>,

    /// When the snapshot was last refreshed from a registry server.
    pub last_updated: SystemTime,
}

impl RegistrySnapshot {
    /// Returns the snapshot's age. A timestamp in the future reads as zero.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.last_updated.elapsed().unwrap_or(Duration::ZERO)
    }
}

/// Reader over the locally cached registry snapshot.
///
/// Returns `None` while no snapshot has ever been populated.
#[async_trait]
pub trait SnapshotSource: Send + Sync + std::fmt::Debug {
    /// Returns the current snapshot, if one exists.
    async fn snapshot(&self) -> Option<RegistrySnapshot>;
}

/// Derives endpoints from snapshot instances carrying a virtual address.
#[derive(Debug)]
pub struct SnapshotResolver {
    source: Arc<dyn SnapshotSource>,
    vip_address: String,
    use_ip: bool,
    relative_uri: String,
}

impl SnapshotResolver {
    /// Creates a resolver deriving endpoints for `vip_address` from `source`.
    ///
    /// With `use_ip` set, the instance's recorded IP address is preferred
    /// over its hostname (falling back to the hostname when none is
    /// recorded).
    #[must_use]
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        vip_address: impl Into<String>,
        use_ip: bool,
        relative_uri: impl Into<String>,
    ) -> Self {
        Self {
            source,
            vip_address: vip_address.into(),
            use_ip,
            relative_uri: relative_uri.into(),
        }
    }

    /// Returns the snapshot source.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn SnapshotSource> {
        &self.source
    }

    /// Derives the candidate endpoints from a snapshot.
    pub(crate) fn endpoints_from(&self, snapshot: &RegistrySnapshot) -> Vec<Endpoint> {
        let endpoints = snapshot
            .instances
            .iter()
            .filter(|instance| instance.status == InstanceStatus::Up)
            .filter(|instance| instance.serves_vip(&self.vip_address))
            .map(|instance| {
                let host = if self.use_ip {
                    instance.ip_address.clone().unwrap_or_else(|| instance.hostname.clone())
                } else {
                    instance.hostname.clone()
                };
                Endpoint::new(host, instance.port)
                    .with_secure(instance.secure)
                    .with_relative_uri(self.relative_uri.clone())
            })
            .collect();
        dedup_endpoints(endpoints)
    }
}

#[async_trait]
impl ClusterResolver for SnapshotResolver {
    async fn resolve(&self) -> Vec<Endpoint> {
        match self.source.snapshot().await {
            Some(snapshot) => self.endpoints_from(&snapshot),
            None => Vec::new(),
        }
    }
}

/// Snapshot file format.
#[derive(Debug, Deserialize)]
struct SnapshotFile {
    instances: Vec<ServiceInstance>,
}

/// Snapshot source backed by a JSON file.
///
/// The file's modification time serves as the snapshot's update time; a file
/// whose mtime cannot be read is treated as arbitrarily old, so the
/// staleness gate rejects it rather than trusting it blindly.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    /// Creates a source reading the snapshot from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn snapshot(&self) -> Option<RegistrySnapshot> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(error) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %error,
                    "registry snapshot file not readable"
                );
                return None;
            },
        };

        let file: SnapshotFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "registry snapshot file did not parse"
                );
                return None;
            },
        };

        let last_updated = tokio::fs::metadata(&self.path)
            .await
            .ok()
            .and_then(|metadata| metadata.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        Some(RegistrySnapshot { instances: file.instances, last_updated })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::StaticSnapshotSource;

    fn instance(id: &str, hostname: &str, vip: Option<&str>) -> ServiceInstance {
        ServiceInstance {
            instance_id: id.to_owned(),
            hostname: hostname.to_owned(),
            ip_address: Some(format!("10.0.0.{}", id.len())),
            port: 8080,
            secure: false,
            vip_address: vip.map(str::to_owned),
            status: InstanceStatus::Up,
        }
    }

    #[tokio::test]
    async fn derives_endpoints_for_matching_vip() {
        let source = Arc::new(StaticSnapshotSource::new());
        source.set_instances(vec![
            instance("a", "registry-1", Some("registry.write")),
            instance("bb", "registry-2", Some("registry.read")),
            instance("ccc", "registry-3", Some("registry.write,registry.read")),
            instance("dddd", "other-1", None),
        ]);

        let resolver = SnapshotResolver::new(source, "registry.write", false, "/v2/");
        let endpoints = resolver.resolve().await;

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].host(), "registry-1");
        assert_eq!(endpoints[1].host(), "registry-3");
    }

    #[tokio::test]
    async fn skips_down_instances() {
        let source = Arc::new(StaticSnapshotSource::new());
        let mut down = instance("a", "registry-1", Some("registry.write"));
        down.status = InstanceStatus::Down;
        source.set_instances(vec![down, instance("bb", "registry-2", Some("registry.write"))]);

        let resolver = SnapshotResolver::new(source, "registry.write", false, "/v2/");
        let endpoints = resolver.resolve().await;

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].host(), "registry-2");
    }

    #[tokio::test]
    async fn use_ip_prefers_recorded_address() {
        let source = Arc::new(StaticSnapshotSource::new());
        let mut no_ip = instance("bb", "registry-2", Some("registry.write"));
        no_ip.ip_address = None;
        source.set_instances(vec![instance("a", "registry-1", Some("registry.write")), no_ip]);

        let resolver = SnapshotResolver::new(source, "registry.write", true, "/v2/");
        let endpoints = resolver.resolve().await;

        assert_eq!(endpoints[0].host(), "10.0.0.1");
        // No recorded IP: falls back to the hostname.
        assert_eq!(endpoints[1].host(), "registry-2");
    }

    #[tokio::test]
    async fn empty_source_resolves_empty() {
        let source = Arc::new(StaticSnapshotSource::new());
        let resolver = SnapshotResolver::new(source, "registry.write", false, "/v2/");
        assert!(resolver.resolve().await.is_empty());
    }

    #[test]
    fn vip_matching_splits_on_commas() {
        let multi = instance("a", "registry-1", Some("registry.write, registry.read"));
        assert!(multi.serves_vip("registry.write"));
        assert!(multi.serves_vip("registry.read"));
        assert!(!multi.serves_vip("registry"));

        let none = instance("a", "registry-1", None);
        assert!(!none.serves_vip("registry.write"));
    }

    #[test]
    fn future_timestamp_reads_as_zero_age() {
        let snapshot = RegistrySnapshot {
            instances: Vec::new(),
            last_updated: SystemTime::now() + Duration::from_secs(60),
        };
        assert_eq!(snapshot.age(), Duration::ZERO);
    }

    #[tokio::test]
    async fn file_source_reads_manifest() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("snapshot.json");
        let manifest = r#"{
            "instances": [
                {
                    "instance_id": "i-1",
                    "hostname": "registry-1",
                    "ip_address": "10.0.0.1",
                    "port": 8080,
                    "vip_address": "registry.write",
                    "status": "UP"
                },
                {
                    "instance_id": "i-2",
                    "hostname": "registry-2",
                    "port": 8080,
                    "status": "DOWN"
                }
            ]
        }"#;
        tokio::fs::write(&path, manifest).await.expect("write manifest");

        let source = FileSnapshotSource::new(&path);
        let snapshot = source.snapshot().await.expect("snapshot should parse");

        assert_eq!(snapshot.instances.len(), 2);
        assert_eq!(snapshot.instances[0].hostname, "registry-1");
        assert_eq!(snapshot.instances[1].status, InstanceStatus::Down);
        // mtime of a freshly written file is recent
        assert!(snapshot.age() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn file_source_missing_file_is_none() {
        let source = FileSnapshotSource::new("/nonexistent/snapshot.json");
        assert!(source.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn file_source_invalid_json_is_none() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("snapshot.json");
        tokio::fs::write(&path, "not json").await.expect("write file");

        let source = FileSnapshotSource::new(&path);
        assert!(source.snapshot().await.is_none());
    }
}
