//! Repository targets
//!
//! A destination is a pull surface, used for presence checks, plus a push
//! endpoint. The two may be different services.

use pkgmirror_core::PackageIdentity;
use std::time::Duration;

use crate::aggregate::AggregateSource;
use crate::config::Endpoint;
use crate::credentials::CredentialStore;
use crate::endpoint::{PackagePublisher, create_destination_feed, create_publisher};
use crate::error::{RepoError, Result};
use crate::index::PackageEntry;

/// Publish timeout used when none is given
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(300);

/// Turn a user-supplied timeout into a duration
///
/// The sign is ignored and zero means [`DEFAULT_PUBLISH_TIMEOUT`].
pub fn normalize_timeout(seconds: i64) -> Duration {
    match seconds.unsigned_abs() {
        0 => DEFAULT_PUBLISH_TIMEOUT,
        secs => Duration::from_secs(secs),
    }
}

/// Destination of a mirror run
pub struct RepositoryTarget {
    pull: AggregateSource,
    push: Box<dyn PackagePublisher>,
    api_key: Option<String>,
    timeout: Duration,
}

impl RepositoryTarget {
    pub fn new(
        pull: AggregateSource,
        push: Box<dyn PackagePublisher>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            pull,
            push,
            api_key,
            timeout,
        }
    }

    /// Build a target from pull and push endpoints
    ///
    /// The pull side is a single feed with no cache and strict failure
    /// handling. A remote pull side with no index yet counts as empty.
    pub fn open(
        pull: &Endpoint,
        push: &Endpoint,
        api_key: Option<String>,
        timeout: Duration,
        credentials: &CredentialStore,
    ) -> Result<Self> {
        let pull_feed = create_destination_feed(pull, credentials)?;
        let publisher = create_publisher(push, credentials, timeout)?;
        Ok(Self::new(
            AggregateSource::new(vec![pull_feed]),
            publisher,
            api_key,
            timeout,
        ))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn push_locator(&self) -> &str {
        self.push.locator()
    }

    /// Whether the destination already holds an identity
    pub async fn exists(&self, identity: &PackageIdentity) -> Result<bool> {
        self.pull.exists(identity).await
    }

    /// Publish under the timeout
    pub async fn publish(&self, entry: &PackageEntry, payload: Vec<u8>) -> Result<()> {
        let publish = self.push.publish(entry, payload, self.api_key.as_deref());
        match tokio::time::timeout(self.timeout, publish).await {
            Ok(result) => result,
            Err(_) => Err(RepoError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::PackageFeed;
    use crate::mock::MockFeed;
    use std::sync::Arc;

    fn mock_target(dest: &MockFeed, timeout: Duration) -> RepositoryTarget {
        RepositoryTarget::new(
            AggregateSource::new(vec![Arc::new(dest.clone()) as Arc<dyn PackageFeed>]),
            Box::new(dest.clone()),
            Some("key".to_string()),
            timeout,
        )
    }

    #[test]
    fn test_normalize_timeout() {
        assert_eq!(normalize_timeout(0), Duration::from_secs(300));
        assert_eq!(normalize_timeout(-30), Duration::from_secs(30));
        assert_eq!(normalize_timeout(45), Duration::from_secs(45));
        assert_eq!(normalize_timeout(i64::MIN), Duration::from_secs(1 << 63));
    }

    #[tokio::test]
    async fn test_publish_then_exists() {
        let dest = MockFeed::new("dest");
        let target = mock_target(&dest, Duration::from_secs(5));
        let foo = PackageIdentity::parse("Foo", "1.0.0").unwrap();

        assert!(!target.exists(&foo).await.unwrap());
        target.publish(&PackageEntry::new(&foo), b"foo".to_vec()).await.unwrap();
        assert!(target.exists(&foo).await.unwrap());
        assert_eq!(dest.published(), vec![foo]);
    }

    #[tokio::test]
    async fn test_publish_timeout() {
        let dest = MockFeed::new("dest").with_publish_delay(Duration::from_millis(200));
        let target = mock_target(&dest, Duration::from_millis(20));
        let foo = PackageIdentity::parse("Foo", "1.0.0").unwrap();

        let result = target.publish(&PackageEntry::new(&foo), Vec::new()).await;
        assert!(matches!(result, Err(RepoError::Timeout { .. })));
        assert!(dest.published().is_empty());
    }

    #[tokio::test]
    async fn test_open_directory_target() {
        let dir = tempfile::TempDir::new().unwrap();
        let endpoint = Endpoint::from_locator(&dir.path().display().to_string()).unwrap();
        let target = RepositoryTarget::open(
            &endpoint,
            &endpoint,
            None,
            normalize_timeout(0),
            &CredentialStore::default(),
        )
        .unwrap();

        let foo = PackageIdentity::parse("Foo", "1.0.0").unwrap();
        target.publish(&PackageEntry::new(&foo), b"foo".to_vec()).await.unwrap();
        assert!(target.exists(&foo).await.unwrap());
        assert_eq!(target.timeout(), DEFAULT_PUBLISH_TIMEOUT);
    }

    #[tokio::test]
    async fn test_open_empty_http_target() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::from_locator(&server.uri()).unwrap();
        let target = RepositoryTarget::open(
            &endpoint,
            &endpoint,
            Some("key".to_string()),
            Duration::from_secs(5),
            &CredentialStore::default(),
        )
        .unwrap();

        let foo = PackageIdentity::parse("Foo", "1.0.0").unwrap();
        assert!(!target.exists(&foo).await.unwrap());
        target.publish(&PackageEntry::new(&foo), b"foo".to_vec()).await.unwrap();
    }
}
