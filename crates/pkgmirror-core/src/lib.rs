//! pkgmirror Core - Core types shared by the mirroring engine
//!
//! This crate provides the foundational types used throughout pkgmirror:
//! - `PackageIdentity`: An exact (id, version) pair
//! - `VersionConstraint`: Exact, unconstrained or ranged version selection
//! - `MirrorRequest`: One unit of work for the mirrorer
//! - `ManifestList`: The `packages.yaml` list read in manifest-list mode

pub mod error;
pub mod identity;
pub mod constraint;
pub mod request;
pub mod manifest;

pub use error::{CoreError, Result};
pub use identity::{
    PackageIdentity, deserialize_optional_version_text, deserialize_version_text, parse_version,
    validate_package_id,
};
pub use constraint::VersionConstraint;
pub use request::MirrorRequest;
pub use manifest::{ManifestEntry, ManifestList, PackageReference, is_manifest_path};
