//! Error types for mirror runs

use pkgmirror_core::CoreError;
use pkgmirror_repo::RepoError;
use thiserror::Error;

/// Errors that end a mirror batch
///
/// Per-package failures are outcomes, not errors; see `MirrorOutcome`.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Manifest(#[from] CoreError),
}

/// Result type for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

impl MirrorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
