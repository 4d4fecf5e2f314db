//! HTTP feed implementation
//!
//! Reads Helm-style feeds serving `index.yaml`, and publishes with
//! `PUT {push}/api/packages/{id}/{version}`.

use async_trait::async_trait;
use pkgmirror_core::PackageIdentity;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use crate::client::SecureHttpClient;
use crate::config::{Endpoint, EndpointKind};
use crate::credentials::{ResolvedCredentials, ScopedCredentials};
use crate::endpoint::{PackageFeed, PackagePublisher};
use crate::error::{RepoError, Result};
use crate::index::{FeedIndex, PackageEntry};

fn scoped(endpoint: &Endpoint, credentials: Option<ResolvedCredentials>) -> ScopedCredentials {
    let mut scoped = ScopedCredentials::default();
    if let Some(creds) = credentials {
        scoped.add(&endpoint.locator, creds);
    }
    scoped
}

/// HTTP feed client
pub struct HttpFeed {
    endpoint: Endpoint,
    client: SecureHttpClient,
    /// Index fetched on first use
    index: OnceCell<FeedIndex>,
    /// Read a missing index as an empty feed
    missing_index_empty: bool,
}

impl HttpFeed {
    pub fn new(endpoint: Endpoint, credentials: Option<ResolvedCredentials>) -> Result<Self> {
        let client = SecureHttpClient::new(scoped(&endpoint, credentials), None)?;
        Ok(Self {
            endpoint,
            client,
            index: OnceCell::new(),
            missing_index_empty: false,
        })
    }

    /// Treat a 404 index as an empty feed, for destinations not yet published to
    pub fn empty_when_missing(mut self) -> Self {
        self.missing_index_empty = true;
        self
    }

    /// Create for a public feed (no auth)
    pub fn public(endpoint: Endpoint) -> Result<Self> {
        Self::new(endpoint, None)
    }

    /// Fetch the feed index, once
    pub async fn index(&self) -> Result<&FeedIndex> {
        self.index
            .get_or_try_init(|| async {
                let url = self.endpoint.index_url();
                tracing::debug!("Fetching index {}", url);
                match self.client.get_bytes(&url).await {
                    Ok(bytes) => FeedIndex::from_bytes(&bytes),
                    Err(RepoError::HttpError { status: 404, .. }) if self.missing_index_empty => {
                        tracing::debug!("No index at {}, reading it as empty", url);
                        Ok(FeedIndex::default())
                    }
                    Err(RepoError::HttpError { status: 404, .. }) => {
                        Err(RepoError::IndexNotFound { url: url.clone() })
                    }
                    Err(e) => Err(e),
                }
            })
            .await
    }
}

#[async_trait]
impl PackageFeed for HttpFeed {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    fn locator(&self) -> &str {
        &self.endpoint.locator
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Remote
    }

    async fn entries(&self, id: &str) -> Result<Vec<PackageEntry>> {
        Ok(self.index().await?.get(id).into_iter().cloned().collect())
    }

    async fn download(&self, entry: &PackageEntry) -> Result<Vec<u8>> {
        let url = entry.download_url(self.endpoint.base_url())?;
        tracing::debug!("Downloading {} {} from {}", entry.id, entry.version, url);
        self.client.get_bytes(&url).await.map_err(|e| match e {
            RepoError::HttpError { status: 404, .. } => RepoError::PackageNotFound {
                id: format!("{} {}", entry.id, entry.version),
                endpoint: self.endpoint.name.clone(),
            },
            other => other,
        })
    }
}

/// HTTP publish endpoint
pub struct HttpPublisher {
    endpoint: Endpoint,
    client: SecureHttpClient,
}

impl HttpPublisher {
    pub fn new(
        endpoint: Endpoint,
        credentials: Option<ResolvedCredentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = SecureHttpClient::new(scoped(&endpoint, credentials), Some(timeout))?;
        Ok(Self { endpoint, client })
    }

    /// `{base}/api/packages/{id}/{version}`, with id and version percent-encoded
    fn publish_url(&self, identity: &PackageIdentity) -> Result<String> {
        let mut url = Url::parse(self.endpoint.base_url())?;
        url.path_segments_mut()
            .map_err(|_| RepoError::InvalidLocator {
                locator: self.endpoint.locator.clone(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "packages", identity.id.as_str(), &identity.version.to_string()]);
        Ok(url.to_string())
    }
}

#[async_trait]
impl PackagePublisher for HttpPublisher {
    fn locator(&self) -> &str {
        &self.endpoint.locator
    }

    async fn publish(
        &self,
        entry: &PackageEntry,
        payload: Vec<u8>,
        api_key: Option<&str>,
    ) -> Result<()> {
        let identity = entry.identity()?;
        let url = self.publish_url(&identity)?;
        tracing::debug!("Publishing {} to {}", identity, url);

        self.client
            .put(&url, payload, api_key)
            .await
            .map_err(|e| match e {
                RepoError::HttpError { status: 409, .. } => RepoError::AlreadyExists {
                    identity: identity.to_string(),
                    endpoint: self.endpoint.locator.clone(),
                },
                other => other,
            })
    }
}
