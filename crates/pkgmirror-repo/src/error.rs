//! Error types for feed operations

use thiserror::Error;

use crate::client::REQUEST_TIMEOUT_SECS;

/// Feed operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Locator Errors ============
    #[error("Invalid locator: {locator} - {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Feed not found: {locator}")]
    EndpointNotFound { locator: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Rate limited by server. Retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    // ============ Authentication Errors ============
    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    // ============ Index Errors ============
    #[error("Index not found at {url}")]
    IndexNotFound { url: String },

    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    // ============ Package Errors ============
    #[error("Package not found: {id} in {endpoint}")]
    PackageNotFound { id: String, endpoint: String },

    #[error("Invalid package entry: {message}")]
    InvalidEntry { message: String },

    #[error("Package {identity} already exists at {endpoint}")]
    AlreadyExists { identity: String, endpoint: String },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    // ============ Aggregate Errors ============
    #[error("Feed '{endpoint}' failed: {source}")]
    AggregateFeed {
        endpoint: String,
        source: Box<RepoError>,
    },

    // ============ Publish Errors ============
    #[error("Publish to {locator} rejected: {message}")]
    PushRejected { locator: String, message: String },

    // ============ Cache Errors ============
    #[error("Cache error: {message}")]
    CacheError { message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                seconds: REQUEST_TIMEOUT_SECS,
            }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidLocator {
            locator: String::new(),
            reason: e.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(e: rusqlite::Error) -> Self {
        RepoError::CacheError {
            message: e.to_string(),
        }
    }
}

impl From<pkgmirror_core::CoreError> for RepoError {
    fn from(e: pkgmirror_core::CoreError) -> Self {
        RepoError::InvalidEntry {
            message: e.to_string(),
        }
    }
}

impl RepoError {
    /// Whether this error means a locator could not be turned into a feed
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            RepoError::InvalidLocator { .. }
                | RepoError::EndpointNotFound { .. }
                | RepoError::InvalidConfig { .. }
        )
    }
}
