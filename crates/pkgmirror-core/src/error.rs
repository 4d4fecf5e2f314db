//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Manifest list not found: {path}")]
    ManifestNotFound { path: String },

    #[error("Invalid manifest list: {message}")]
    InvalidManifest { message: String },

    #[error("Failed to parse manifest list: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid package id '{id}': {reason}")]
    InvalidPackageId { id: String, reason: String },

    #[error("Invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    #[error("Invalid version constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
