//! CLI error types with exit code handling
//!
//! Library errors are mapped onto a small set of diagnostics, each carrying
//! the exit code the process ends with.

use miette::Diagnostic;
use pkgmirror_core::CoreError;
use pkgmirror_engine::MirrorError;
use pkgmirror_repo::RepoError;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Arguments or configuration cannot be acted upon
    #[error("Invalid usage: {message}")]
    #[diagnostic(code(pkgmirror::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A source, pull or push locator did not resolve
    #[error("Cannot resolve source: {message}")]
    #[diagnostic(code(pkgmirror::cli::source))]
    Source {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A feed failed and failing feeds are not ignored
    #[error("Feed failure: {message}")]
    #[diagnostic(
        code(pkgmirror::cli::feed),
        help("Drop --strict-sources to skip unreachable feeds")
    )]
    Feed { message: String },

    /// Manifest list missing or malformed
    #[error("Manifest error: {message}")]
    #[diagnostic(code(pkgmirror::cli::manifest))]
    Manifest { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(pkgmirror::cli::io))]
    Io { message: String },

    #[error("{message}")]
    #[diagnostic(code(pkgmirror::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Source { .. } => exit_codes::SOURCE_ERROR,
            CliError::Feed { .. } => exit_codes::FEED_ERROR,
            CliError::Manifest { .. } => exit_codes::MANIFEST_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: None,
        }
    }

    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let message = err.to_string();
        match err {
            RepoError::InvalidLocator { .. } => CliError::Source {
                message,
                help: Some(
                    "Use an http(s):// URL, a directory path or a configured feed name".to_string(),
                ),
            },
            RepoError::EndpointNotFound { .. } => CliError::Source {
                message,
                help: Some("Local feeds must be existing directories".to_string()),
            },
            RepoError::AggregateFeed { .. } => CliError::Feed { message },
            RepoError::InvalidConfig { .. } => CliError::usage(message),
            RepoError::Io(_) => CliError::Io { message },
            _ => CliError::Other { message },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ManifestNotFound { .. }
            | CoreError::InvalidManifest { .. }
            | CoreError::YamlParse(_) => CliError::Manifest { message },
            CoreError::InvalidVersion { .. }
            | CoreError::InvalidConstraint { .. }
            | CoreError::InvalidPackageId { .. } => {
                CliError::usage(message)
            }
            CoreError::Io(_) => CliError::Io { message },
        }
    }
}

impl From<MirrorError> for CliError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::Configuration { message } => CliError::usage_with_help(
                message,
                "Pin versions inside the manifest list instead of passing --version",
            ),
            MirrorError::Repo(e) => e.into(),
            MirrorError::Manifest(e) => e.into(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let configuration: CliError = MirrorError::configuration("version with manifest").into();
        assert_eq!(configuration.exit_code(), 64);

        let locator: CliError = RepoError::InvalidLocator {
            locator: "ftp://feed".to_string(),
            reason: "unsupported scheme".to_string(),
        }
        .into();
        assert_eq!(locator.exit_code(), 6);

        let feed: CliError = RepoError::AggregateFeed {
            endpoint: "nuget".to_string(),
            source: Box::new(RepoError::NetworkError {
                message: "down".to_string(),
            }),
        }
        .into();
        assert_eq!(feed.exit_code(), 7);

        let manifest: CliError = CoreError::ManifestNotFound {
            path: "packages.yaml".to_string(),
        }
        .into();
        assert_eq!(manifest.exit_code(), 4);
    }
}
