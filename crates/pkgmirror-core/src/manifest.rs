//! Manifest lists
//!
//! A manifest list (`packages.yaml`) enumerates the packages to mirror in order:
//!
//! ```yaml
//! packages:
//!   - id: Bar
//!     version: 2.0.0-beta   # exact pin
//!   - id: Baz
//!     version: "^1.2"       # range
//!   - id: Qux               # latest
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constraint::VersionConstraint;
use crate::error::{CoreError, Result};
use crate::identity::deserialize_optional_version_text;

/// File names recognised as manifest lists
const MANIFEST_FILE_NAMES: &[&str] = &["packages.yaml", "packages.yml"];
const MANIFEST_SUFFIXES: &[&str] = &[".packages.yaml", ".packages.yml"];

/// Check whether a command subject names a manifest list rather than a package id
pub fn is_manifest_path(subject: &str) -> bool {
    let file_name = Path::new(subject)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    MANIFEST_FILE_NAMES.contains(&file_name.as_str())
        || MANIFEST_SUFFIXES.iter().any(|s| file_name.ends_with(s))
}

/// Parsed `packages.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestList {
    #[serde(default)]
    pub packages: Vec<ManifestEntry>,
}

/// One entry of a manifest list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,

    /// Version or constraint; absent means latest
    #[serde(default, deserialize_with = "deserialize_optional_version_text")]
    pub version: Option<String>,
}

/// A manifest entry with its constraint parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub id: String,
    pub constraint: VersionConstraint,
}

impl ManifestList {
    /// Load a manifest list from disk
    ///
    /// A missing file is an error, never an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CoreError::ManifestNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a manifest list from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let list: Self = serde_yaml::from_str(yaml)?;

        if let Some(pos) = list.packages.iter().position(|e| e.id.trim().is_empty()) {
            return Err(CoreError::InvalidManifest {
                message: format!("entry {} has an empty id", pos + 1),
            });
        }

        Ok(list)
    }

    /// Entries in file order with parsed constraints
    pub fn references(&self) -> Result<Vec<PackageReference>> {
        self.packages
            .iter()
            .map(|entry| {
                let constraint = match &entry.version {
                    Some(version) => VersionConstraint::parse(version)?,
                    None => VersionConstraint::Unconstrained,
                };
                Ok(PackageReference {
                    id: entry.id.trim().to_string(),
                    constraint,
                })
            })
            .collect()
    }
}
