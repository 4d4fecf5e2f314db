//! pkgmirror Engine - copies packages and their dependencies between feeds
//!
//! This crate provides:
//! - `PackageSelector`: turns a subject (package id or manifest list) into requests
//! - `Mirrorer`: resolves, checks presence, mirrors dependencies first, then transfers
//! - `MirrorObserver`: progress hooks around each transfer
//! - `OperationScope`: an audit bracket around one mirror batch

pub mod error;
pub mod selector;
pub mod mirror;
pub mod scope;

pub use error::{MirrorError, Result};
pub use selector::{ManifestReader, PackageSelector, YamlManifestReader};
pub use mirror::{
    MirrorObserver, MirrorOptions, MirrorOutcome, MirrorReport, MirrorSession, Mirrorer,
    PackageOutcome,
};
pub use scope::{OperationScope, ScopeHandle, ScopeListener};
