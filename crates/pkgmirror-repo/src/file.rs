//! Directory feeds
//!
//! A local directory laid out like an HTTP feed: an `index.yaml` next to the
//! package archives. A directory without an index is an empty feed.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;

use crate::config::{Endpoint, EndpointKind};
use crate::endpoint::{PackageFeed, PackagePublisher};
use crate::error::{RepoError, Result};
use crate::index::{FeedIndex, PackageEntry, compute_digest};

const INDEX_FILE: &str = "index.yaml";

fn root_of(endpoint: &Endpoint) -> Result<PathBuf> {
    let root = endpoint
        .local_path()
        .ok_or_else(|| RepoError::InvalidLocator {
            locator: endpoint.locator.clone(),
            reason: "not a local directory".to_string(),
        })?;

    if !root.is_dir() {
        return Err(RepoError::EndpointNotFound {
            locator: endpoint.locator.clone(),
        });
    }
    Ok(root)
}

/// Resolve an entry's archive below `root`
///
/// Only plain relative paths are accepted; absolute paths and `..` would
/// read outside the feed.
fn archive_location(root: &Path, entry: &PackageEntry) -> Result<PathBuf> {
    let location = entry.archive_path()?;
    let location = Path::new(location.strip_prefix("file://").unwrap_or(location));

    if location
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        return Err(RepoError::InvalidEntry {
            message: format!(
                "{} {} points outside the feed: {}",
                entry.id,
                entry.version,
                location.display()
            ),
        });
    }
    Ok(root.join(location))
}

async fn read_index(root: &Path) -> Result<FeedIndex> {
    match tokio::fs::read(root.join(INDEX_FILE)).await {
        Ok(bytes) => FeedIndex::from_bytes(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FeedIndex::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_index(root: &Path, index: &FeedIndex) -> Result<()> {
    let tmp = root.join(format!(".{}.tmp", INDEX_FILE));
    tokio::fs::write(&tmp, index.to_yaml()?).await?;
    tokio::fs::rename(&tmp, root.join(INDEX_FILE)).await?;
    Ok(())
}

/// Read side of a directory feed
pub struct DirectoryFeed {
    endpoint: Endpoint,
    root: PathBuf,
}

impl DirectoryFeed {
    /// Open an existing directory
    pub fn open(endpoint: Endpoint) -> Result<Self> {
        let root = root_of(&endpoint)?;
        Ok(Self { endpoint, root })
    }

    /// Current index; re-read on every call so publishes are visible
    pub async fn index(&self) -> Result<FeedIndex> {
        read_index(&self.root).await
    }
}

#[async_trait]
impl PackageFeed for DirectoryFeed {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn locator(&self) -> &str {
        &self.endpoint.locator
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Local
    }

    async fn entries(&self, id: &str) -> Result<Vec<PackageEntry>> {
        Ok(self.index().await?.get(id).into_iter().cloned().collect())
    }

    async fn download(&self, entry: &PackageEntry) -> Result<Vec<u8>> {
        let path = archive_location(&self.root, entry)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepoError::PackageNotFound {
                id: format!("{} {}", entry.id, entry.version),
                endpoint: self.endpoint.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write side of a directory feed
pub struct DirectoryPublisher {
    endpoint: Endpoint,
    root: PathBuf,
    /// Serializes index read-modify-write
    lock: Mutex<()>,
}

impl DirectoryPublisher {
    pub fn open(endpoint: Endpoint) -> Result<Self> {
        let root = root_of(&endpoint)?;
        Ok(Self {
            endpoint,
            root,
            lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl PackagePublisher for DirectoryPublisher {
    fn locator(&self) -> &str {
        &self.endpoint.locator
    }

    async fn publish(
        &self,
        entry: &PackageEntry,
        payload: Vec<u8>,
        _api_key: Option<&str>,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let identity = entry.identity()?;

        let mut index = read_index(&self.root).await?;
        if index.find(&identity).is_some() {
            return Err(RepoError::AlreadyExists {
                identity: identity.to_string(),
                endpoint: self.endpoint.locator.clone(),
            });
        }

        let file_name = format!("{}-{}.tgz", identity.id, identity.version);
        tokio::fs::write(self.root.join(&file_name), &payload).await?;

        let mut published = entry.clone();
        published.version = identity.version.to_string();
        published.urls = vec![file_name];
        published.digest = Some(compute_digest(&payload));
        published.created = Some(Utc::now());
        index.add_entry(published);

        write_index(&self.root, &index).await?;
        tracing::debug!("Wrote {} to {}", identity, self.root.display());
        Ok(())
    }
}
