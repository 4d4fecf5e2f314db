//! Aggregate sources
//!
//! Several feeds merged into one read view, first match wins. The optional
//! cache is consulted before any feed; local directory feeds come before
//! HTTP feeds, keeping the caller's order within each kind.

use pkgmirror_core::{MirrorRequest, PackageIdentity, VersionConstraint};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Endpoint;
use crate::credentials::CredentialStore;
use crate::endpoint::{CacheStore, PackageFeed, create_feed};
use crate::error::{RepoError, Result};
use crate::index::PackageEntry;

/// Merged read view over several feeds
pub struct AggregateSource {
    cache: Option<Arc<dyn CacheStore>>,
    feeds: Vec<Arc<dyn PackageFeed>>,
    ignore_failing: bool,
}

impl AggregateSource {
    /// Create from feeds; local feeds are moved ahead of remote ones
    pub fn new(mut feeds: Vec<Arc<dyn PackageFeed>>) -> Self {
        feeds.sort_by_key(|feed| feed.kind().cost());
        Self {
            cache: None,
            feeds,
            ignore_failing: false,
        }
    }

    /// Create feeds for endpoints
    pub fn from_endpoints(endpoints: Vec<Endpoint>, credentials: &CredentialStore) -> Result<Self> {
        let feeds = endpoints
            .iter()
            .map(|endpoint| create_feed(endpoint, credentials))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(feeds))
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Skip feeds that fail instead of aborting
    pub fn ignore_failing_repositories(mut self, ignore: bool) -> Self {
        self.ignore_failing = ignore;
        self
    }

    /// Feed names in query order, cache excluded
    pub fn feed_names(&self) -> Vec<&str> {
        self.feeds.iter().map(|feed| feed.name()).collect()
    }

    /// Apply the failure policy to a feed error
    fn feed_failed(&self, feed: &dyn PackageFeed, error: RepoError) -> Result<()> {
        if self.ignore_failing {
            tracing::warn!("Skipping feed {}: {}", feed.name(), error);
            Ok(())
        } else {
            Err(RepoError::AggregateFeed {
                endpoint: feed.name().to_string(),
                source: Box::new(error),
            })
        }
    }

    /// All known entries for an id, keyed by identity, first source wins
    async fn collect(&self, id: &str) -> Result<BTreeMap<PackageIdentity, PackageEntry>> {
        let mut merged = BTreeMap::new();

        if let Some(cache) = &self.cache {
            match cache.entries(id).await {
                Ok(entries) => merge(&mut merged, id, entries),
                Err(e) => tracing::debug!("Cache lookup for {} failed: {}", id, e),
            }
        }

        for feed in &self.feeds {
            match feed.entries(id).await {
                Ok(entries) => merge(&mut merged, id, entries),
                Err(e) => self.feed_failed(feed.as_ref(), e)?,
            }
        }

        Ok(merged)
    }

    /// Available identities satisfying a constraint
    pub async fn fetch(
        &self,
        id: &str,
        constraint: &VersionConstraint,
        allow_prerelease: bool,
    ) -> Result<Vec<PackageIdentity>> {
        Ok(self
            .collect(id)
            .await?
            .into_keys()
            .filter(|identity| constraint.allows(&identity.version, allow_prerelease))
            .collect())
    }

    /// Highest identity satisfying a request, with its entry
    pub async fn resolve(&self, request: &MirrorRequest) -> Result<Option<PackageEntry>> {
        let merged = self.collect(&request.id).await?;
        let best = request
            .constraint
            .best_match(merged.keys().map(|identity| &identity.version), request.allow_prerelease)
            .cloned();

        Ok(best.and_then(|version| {
            merged.into_iter().find_map(|(identity, entry)| {
                (identity.version == version).then_some(entry)
            })
        }))
    }

    /// Metadata for an exact identity from the first source carrying it
    pub async fn entry(&self, identity: &PackageIdentity) -> Result<Option<PackageEntry>> {
        if let Some(cache) = &self.cache {
            match cache.find(identity).await {
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => {}
                Err(e) => tracing::debug!("Cache lookup for {} failed: {}", identity, e),
            }
        }

        for feed in &self.feeds {
            match feed.find(identity).await {
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => {}
                Err(e) => self.feed_failed(feed.as_ref(), e)?,
            }
        }

        Ok(None)
    }

    /// Whether any source carries an identity
    pub async fn exists(&self, identity: &PackageIdentity) -> Result<bool> {
        Ok(self.entry(identity).await?.is_some())
    }

    /// Download the archive for an identity
    ///
    /// The payload is checked against the entry digest. A payload fetched
    /// from a feed is stored in the cache.
    pub async fn download(&self, identity: &PackageIdentity) -> Result<Vec<u8>> {
        if let Some(cache) = &self.cache {
            match cached_payload(cache.as_ref(), identity).await {
                Ok(Some(payload)) => {
                    tracing::debug!("Cache hit for {}", identity);
                    return Ok(payload);
                }
                Ok(None) => tracing::debug!("Cache miss for {}", identity),
                Err(e) => tracing::debug!("Cache read for {} failed: {}", identity, e),
            }
        }

        for feed in &self.feeds {
            let entry = match feed.find(identity).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    self.feed_failed(feed.as_ref(), e)?;
                    continue;
                }
            };

            let payload = match feed.download(&entry).await {
                Ok(payload) => payload,
                Err(e) => {
                    self.feed_failed(feed.as_ref(), e)?;
                    continue;
                }
            };
            entry.verify(&payload)?;

            if let Some(cache) = &self.cache
                && let Err(e) = cache.store(&entry, &payload).await
            {
                tracing::debug!("Could not cache {}: {}", identity, e);
            }

            tracing::debug!("Downloaded {} from {}", identity, feed.name());
            return Ok(payload);
        }

        Err(RepoError::PackageNotFound {
            id: identity.to_string(),
            endpoint: self.feed_names().join(", "),
        })
    }
}

fn merge(
    merged: &mut BTreeMap<PackageIdentity, PackageEntry>,
    id: &str,
    entries: Vec<PackageEntry>,
) {
    for entry in entries {
        if entry.id != id {
            tracing::debug!("Skipping {} {} listed under {}", entry.id, entry.version, id);
            continue;
        }
        match entry.identity() {
            Ok(identity) => {
                merged.entry(identity).or_insert(entry);
            }
            Err(e) => tracing::debug!("Skipping {} {}: {}", entry.id, entry.version, e),
        }
    }
}

async fn cached_payload(
    cache: &dyn CacheStore,
    identity: &PackageIdentity,
) -> Result<Option<Vec<u8>>> {
    let Some(entry) = cache.find(identity).await? else {
        return Ok(None);
    };
    let payload = cache.download(&entry).await?;
    entry.verify(&payload)?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointKind;
    use crate::mock::MockFeed;
    use semver::Version;

    fn source(feeds: &[&MockFeed]) -> AggregateSource {
        AggregateSource::new(
            feeds
                .iter()
                .map(|feed| Arc::new((*feed).clone()) as Arc<dyn PackageFeed>)
                .collect(),
        )
    }

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    #[tokio::test]
    async fn test_one_failing_feed_ignored() {
        let a = MockFeed::new("a").with_package("Foo", "1.0.0", &[]);
        let b = MockFeed::new("b").with_package("Foo", "2.0.0", &[]).failing();
        let c = MockFeed::new("c").with_package("Foo", "3.0.0", &[]);

        let aggregate = source(&[&a, &b, &c]).ignore_failing_repositories(true);
        let found = aggregate
            .fetch("Foo", &VersionConstraint::Unconstrained, false)
            .await
            .unwrap();

        assert_eq!(found, vec![identity("Foo", "1.0.0"), identity("Foo", "3.0.0")]);
    }

    #[tokio::test]
    async fn test_failing_feed_strict() {
        let a = MockFeed::new("a").with_package("Foo", "1.0.0", &[]);
        let b = MockFeed::new("b").failing();

        let aggregate = source(&[&a, &b]);
        let result = aggregate
            .fetch("Foo", &VersionConstraint::Unconstrained, false)
            .await;

        match result {
            Err(RepoError::AggregateFeed { endpoint, .. }) => assert_eq!(endpoint, "b"),
            other => panic!("expected AggregateFeed, got {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn test_local_feeds_first() {
        let remote = MockFeed::new("remote");
        let local = MockFeed::local("local");
        let aggregate = source(&[&remote, &local]);

        assert_eq!(aggregate.feed_names(), vec!["local", "remote"]);
        assert_eq!(local.kind(), EndpointKind::Local);
    }

    #[tokio::test]
    async fn test_resolve_prerelease() {
        let a = MockFeed::new("a");
        let b = MockFeed::new("b")
            .with_package("Foo", "1.0.0", &[])
            .with_package("Foo", "1.1.0-beta", &[]);
        let aggregate = source(&[&a, &b]);

        let stable = aggregate.resolve(&MirrorRequest::new("Foo")).await.unwrap().unwrap();
        assert_eq!(stable.version, "1.0.0");

        let pre = aggregate
            .resolve(&MirrorRequest::new("Foo").allow_prerelease(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pre.version, "1.1.0-beta");

        let missing = aggregate
            .resolve(
                &MirrorRequest::new("Foo")
                    .with_constraint(VersionConstraint::Exact(Version::new(9, 0, 0))),
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let a = MockFeed::new("a").with_package("Foo", "1.0.0", &[("Bar", "1.0.0")]);
        let b = MockFeed::new("b").with_package("Foo", "1.0.0", &[]);
        let aggregate = source(&[&a, &b]);

        let entry = aggregate.entry(&identity("Foo", "1.0.0")).await.unwrap().unwrap();
        assert_eq!(entry.dependencies.len(), 1);
        assert_eq!(b.operation_counts().finds, 0);
    }

    #[tokio::test]
    async fn test_cache_consulted_first_and_filled() {
        let cache = MockFeed::local("cache");
        let remote = MockFeed::new("remote").with_package("Foo", "1.0.0", &[]);
        let aggregate = source(&[&remote]).with_cache(Arc::new(cache.clone()));

        let foo = identity("Foo", "1.0.0");
        assert_eq!(aggregate.download(&foo).await.unwrap(), b"Foo-1.0.0");
        assert_eq!(cache.operation_counts().stores, 1);
        assert!(cache.contains(&foo));

        assert_eq!(aggregate.download(&foo).await.unwrap(), b"Foo-1.0.0");
        assert_eq!(remote.operation_counts().downloads, 1);
    }

    #[tokio::test]
    async fn test_cache_failure_never_fatal() {
        let cache = MockFeed::local("cache").failing();
        let remote = MockFeed::new("remote").with_package("Foo", "1.0.0", &[]);
        let aggregate = source(&[&remote]).with_cache(Arc::new(cache));

        let foo = identity("Foo", "1.0.0");
        assert!(aggregate.exists(&foo).await.unwrap());
        assert_eq!(aggregate.download(&foo).await.unwrap(), b"Foo-1.0.0");
        assert_eq!(
            aggregate
                .fetch("Foo", &VersionConstraint::Unconstrained, false)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_digest_mismatch() {
        let mut entry = PackageEntry::new(&identity("Foo", "1.0.0"));
        entry.urls.push("Foo-1.0.0.tgz".to_string());
        entry.digest = Some(crate::index::compute_digest(b"expected"));
        let feed = MockFeed::new("a").with_entry(entry, b"tampered".to_vec());
        let aggregate = source(&[&feed]);

        assert!(matches!(
            aggregate.download(&identity("Foo", "1.0.0")).await,
            Err(RepoError::IntegrityCheckFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let aggregate = source(&[&MockFeed::new("a")]);
        assert!(matches!(
            aggregate.download(&identity("Foo", "1.0.0")).await,
            Err(RepoError::PackageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_ignores_mislabeled_entries() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("index.yaml"),
            "entries:\n  Foo:\n    - id: Other\n      version: 1.0.0\n      urls: [Other-1.0.0.tgz]\n",
        )
        .unwrap();
        let endpoint = Endpoint::from_locator(&dir.path().display().to_string()).unwrap();
        let feed = crate::file::DirectoryFeed::open(endpoint).unwrap();
        let aggregate = AggregateSource::new(vec![Arc::new(feed) as Arc<dyn PackageFeed>]);

        assert!(aggregate.resolve(&MirrorRequest::new("Foo")).await.unwrap().is_none());
        assert!(
            aggregate
                .fetch("Foo", &VersionConstraint::Unconstrained, false)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
