//! pkgmirror Feed Management
//!
//! This crate provides the read and write sides of package mirroring:
//!
//! - **HTTP feeds**: remote feeds serving an `index.yaml` plus package archives
//! - **Directory feeds**: local folders laid out the same way, readable and writable
//! - **Package cache**: a SQLite store consulted before any remote feed
//! - **Aggregate sources**: several feeds merged into one read view
//! - **Repository targets**: a pull surface for presence checks plus a push endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use pkgmirror_core::{MirrorRequest, PackageIdentity};
//! use pkgmirror_repo::{AggregateSource, CredentialStore, Endpoint};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let feeds = vec![
//!     Endpoint::from_locator("https://feeds.example.com/stable")?,
//!     Endpoint::from_locator("./local-feed")?,
//! ];
//! let source = AggregateSource::from_endpoints(feeds, &CredentialStore::default())?
//!     .ignore_failing_repositories(true);
//!
//! if let Some(entry) = source.resolve(&MirrorRequest::new("Foo")).await? {
//!     let identity: PackageIdentity = entry.identity()?;
//!     let payload = source.download(&identity).await?;
//!     println!("{} is {} bytes", identity, payload.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Credentials are NEVER sent after cross-origin redirects
//! - Archive digests from the index are verified on download

pub mod error;
pub mod config;
pub mod credentials;
pub mod client;
pub mod index;
pub mod endpoint;
pub mod http;
pub mod file;
pub mod cache;
pub mod aggregate;
pub mod target;
pub mod mock;

// Re-exports for convenience
pub use error::{RepoError, Result};
pub use config::{Endpoint, EndpointKind, FeedConfig, MirrorConfig};
pub use credentials::{CredentialStore, Credentials, ResolvedCredentials, ScopedCredentials};
pub use client::SecureHttpClient;
pub use index::{DependencyEntry, FeedIndex, PackageEntry, compute_digest};
pub use endpoint::{
    CacheStore, PackageFeed, PackagePublisher, create_destination_feed, create_feed,
    create_publisher,
};
pub use http::{HttpFeed, HttpPublisher};
pub use file::{DirectoryFeed, DirectoryPublisher};
pub use cache::PackageCache;
pub use aggregate::AggregateSource;
pub use target::{DEFAULT_PUBLISH_TIMEOUT, RepositoryTarget, normalize_timeout};
pub use mock::{MockCache, MockFeed, MockPublisher, OperationCounts};
