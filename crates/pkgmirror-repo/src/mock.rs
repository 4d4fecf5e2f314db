//! In-memory endpoints for testing
//!
//! `MockFeed` plays every endpoint role (feed, publish destination, cache)
//! without touching the network or the filesystem, and counts the
//! operations performed on it.

use async_trait::async_trait;
use pkgmirror_core::PackageIdentity;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::config::EndpointKind;
use crate::endpoint::{CacheStore, PackageFeed, PackagePublisher};
use crate::error::{RepoError, Result};
use crate::index::{DependencyEntry, PackageEntry, compute_digest};

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub lists: usize,
    pub finds: usize,
    pub downloads: usize,
    pub publishes: usize,
    pub stores: usize,
}

#[derive(Default)]
struct MockState {
    packages: Vec<(PackageEntry, Vec<u8>)>,
    failing: bool,
    publish_error: Option<String>,
    publish_delay: Option<Duration>,
    published: Vec<PackageIdentity>,
    operations: OperationCounts,
}

/// In-memory feed, publish destination and cache
#[derive(Clone)]
pub struct MockFeed {
    name: String,
    kind: EndpointKind,
    state: Arc<RwLock<MockState>>,
}

/// A mock used as a publish destination
pub type MockPublisher = MockFeed;

/// A mock used as the package cache
pub type MockCache = MockFeed;

impl MockFeed {
    /// Create an empty remote mock
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EndpointKind::Remote,
            state: Arc::new(RwLock::new(MockState::default())),
        }
    }

    /// Create an empty local mock
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Local,
            ..Self::new(name)
        }
    }

    /// Add a package; the payload is `"{id}-{version}"` and the digest matches it
    pub fn with_package(self, id: &str, version: &str, dependencies: &[(&str, &str)]) -> Self {
        let mut entry = PackageEntry {
            id: id.to_string(),
            version: version.to_string(),
            description: None,
            urls: vec![format!("{}-{}.tgz", id, version)],
            digest: None,
            created: None,
            dependencies: dependencies
                .iter()
                .map(|(dep, constraint)| DependencyEntry::new(*dep, Some(*constraint)))
                .collect(),
        };
        let payload = format!("{}-{}", id, version).into_bytes();
        entry.digest = Some(compute_digest(&payload));
        self.with_entry(entry, payload)
    }

    /// Add an entry with an arbitrary payload
    pub fn with_entry(self, entry: PackageEntry, payload: Vec<u8>) -> Self {
        self.write().packages.push((entry, payload));
        self
    }

    /// Make every read fail with a network error
    pub fn failing(self) -> Self {
        self.write().failing = true;
        self
    }

    /// Make every publish fail with the given message
    pub fn fail_publish(self, message: impl Into<String>) -> Self {
        self.write().publish_error = Some(message.into());
        self
    }

    /// Delay every publish
    pub fn with_publish_delay(self, delay: Duration) -> Self {
        self.write().publish_delay = Some(delay);
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.read().operations.clone()
    }

    /// Identities published so far, in order
    pub fn published(&self) -> Vec<PackageIdentity> {
        self.read().published.clone()
    }

    /// Whether the mock holds an identity
    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        lookup(&self.read(), identity).is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_reachable(&self) -> Result<()> {
        if self.read().failing {
            return Err(RepoError::NetworkError {
                message: format!("{} is unreachable", self.name),
            });
        }
        Ok(())
    }
}

fn lookup<'a>(state: &'a MockState, identity: &PackageIdentity) -> Option<&'a (PackageEntry, Vec<u8>)> {
    state.packages.iter().find(|(entry, _)| {
        entry
            .identity()
            .map(|found| found == *identity)
            .unwrap_or(false)
    })
}

#[async_trait]
impl PackageFeed for MockFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn locator(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EndpointKind {
        self.kind
    }

    async fn entries(&self, id: &str) -> Result<Vec<PackageEntry>> {
        self.write().operations.lists += 1;
        self.check_reachable()?;

        Ok(self
            .read()
            .packages
            .iter()
            .filter(|(entry, _)| entry.id == id)
            .map(|(entry, _)| entry.clone())
            .collect())
    }

    async fn find(&self, identity: &PackageIdentity) -> Result<Option<PackageEntry>> {
        self.write().operations.finds += 1;
        self.check_reachable()?;

        Ok(lookup(&self.read(), identity).map(|(entry, _)| entry.clone()))
    }

    async fn download(&self, entry: &PackageEntry) -> Result<Vec<u8>> {
        self.write().operations.downloads += 1;
        self.check_reachable()?;

        let identity = entry.identity()?;
        lookup(&self.read(), &identity)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| RepoError::PackageNotFound {
                id: identity.to_string(),
                endpoint: self.name.clone(),
            })
    }
}

#[async_trait]
impl PackagePublisher for MockFeed {
    fn locator(&self) -> &str {
        &self.name
    }

    async fn publish(
        &self,
        entry: &PackageEntry,
        payload: Vec<u8>,
        _api_key: Option<&str>,
    ) -> Result<()> {
        let delay = {
            let mut state = self.write();
            state.operations.publishes += 1;
            state.publish_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let identity = entry.identity()?;
        let mut state = self.write();
        if let Some(message) = &state.publish_error {
            return Err(RepoError::PushRejected {
                locator: self.name.clone(),
                message: message.clone(),
            });
        }
        if lookup(&state, &identity).is_some() {
            return Err(RepoError::AlreadyExists {
                identity: identity.to_string(),
                endpoint: self.name.clone(),
            });
        }

        state.packages.push((entry.clone(), payload));
        state.published.push(identity);
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MockFeed {
    async fn store(&self, entry: &PackageEntry, payload: &[u8]) -> Result<()> {
        self.write().operations.stores += 1;
        self.check_reachable()?;

        let identity = entry.identity()?;
        let mut state = self.write();
        state
            .packages
            .retain(|(existing, _)| existing.identity().map(|i| i != identity).unwrap_or(true));
        state.packages.push((entry.clone(), payload.to_vec()));
        Ok(())
    }
}
