//! Unified endpoint traits
//!
//! Provides one read interface for every feed kind (HTTP, directory, cache)
//! and one write interface for publish destinations.

use async_trait::async_trait;
use pkgmirror_core::PackageIdentity;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Endpoint, EndpointKind};
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::file::{DirectoryFeed, DirectoryPublisher};
use crate::http::{HttpFeed, HttpPublisher};
use crate::index::PackageEntry;

/// Read side of a feed
#[async_trait]
pub trait PackageFeed: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// URL or directory
    fn locator(&self) -> &str;

    fn kind(&self) -> EndpointKind;

    /// All index entries for a package id, in feed order
    async fn entries(&self, id: &str) -> Result<Vec<PackageEntry>>;

    /// Entry for an exact identity
    async fn find(&self, identity: &PackageIdentity) -> Result<Option<PackageEntry>> {
        let entries = self.entries(&identity.id).await?;
        Ok(entries.into_iter().find(|entry| {
            entry
                .identity()
                .map(|found| found == *identity)
                .unwrap_or(false)
        }))
    }

    /// Download the archive for an entry
    async fn download(&self, entry: &PackageEntry) -> Result<Vec<u8>>;
}

/// Write side of a destination
#[async_trait]
pub trait PackagePublisher: Send + Sync {
    fn locator(&self) -> &str;

    /// Publish one archive
    ///
    /// Publishing an identity the destination already holds fails with
    /// `RepoError::AlreadyExists`.
    async fn publish(
        &self,
        entry: &PackageEntry,
        payload: Vec<u8>,
        api_key: Option<&str>,
    ) -> Result<()>;
}

/// A feed that can also be filled, used as the local package cache
#[async_trait]
pub trait CacheStore: PackageFeed {
    async fn store(&self, entry: &PackageEntry, payload: &[u8]) -> Result<()>;
}

/// Create a feed for an endpoint
pub fn create_feed(
    endpoint: &Endpoint,
    credentials: &CredentialStore,
) -> Result<Arc<dyn PackageFeed>> {
    match endpoint.kind {
        EndpointKind::Remote => {
            let resolved = credentials.credentials_for(endpoint)?;
            Ok(Arc::new(HttpFeed::new(endpoint.clone(), resolved)?))
        }
        EndpointKind::Local => Ok(Arc::new(DirectoryFeed::open(endpoint.clone())?)),
    }
}

/// Create the pull side of a destination
///
/// Unlike [`create_feed`], a remote destination with no index yet reads as
/// an empty feed.
pub fn create_destination_feed(
    endpoint: &Endpoint,
    credentials: &CredentialStore,
) -> Result<Arc<dyn PackageFeed>> {
    match endpoint.kind {
        EndpointKind::Remote => {
            let resolved = credentials.credentials_for(endpoint)?;
            Ok(Arc::new(
                HttpFeed::new(endpoint.clone(), resolved)?.empty_when_missing(),
            ))
        }
        EndpointKind::Local => create_feed(endpoint, credentials),
    }
}

/// Create a publisher for an endpoint
///
/// `timeout` bounds each HTTP upload request.
pub fn create_publisher(
    endpoint: &Endpoint,
    credentials: &CredentialStore,
    timeout: Duration,
) -> Result<Box<dyn PackagePublisher>> {
    match endpoint.kind {
        EndpointKind::Remote => {
            let resolved = credentials.credentials_for(endpoint)?;
            Ok(Box::new(HttpPublisher::new(
                endpoint.clone(),
                resolved,
                timeout,
            )?))
        }
        EndpointKind::Local => Ok(Box::new(DirectoryPublisher::open(endpoint.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoError;

    #[test]
    fn test_create_feed_missing_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let endpoint = Endpoint::from_locator(&missing.display().to_string()).unwrap();

        let result = create_feed(&endpoint, &CredentialStore::default());
        assert!(matches!(result, Err(RepoError::EndpointNotFound { .. })));
    }

    #[test]
    fn test_create_feed_kinds() {
        let dir = tempfile::TempDir::new().unwrap();
        let local = Endpoint::from_locator(&dir.path().display().to_string()).unwrap();
        let remote = Endpoint::from_locator("https://feeds.example.com").unwrap();
        let store = CredentialStore::default();

        assert_eq!(create_feed(&local, &store).unwrap().kind(), EndpointKind::Local);
        assert_eq!(create_feed(&remote, &store).unwrap().kind(), EndpointKind::Remote);
        assert!(create_publisher(&remote, &store, Duration::from_secs(5)).is_ok());
    }
}
