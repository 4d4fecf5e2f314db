//! Feed index types
//!
//! Every feed, remote or local, publishes an `index.yaml` listing its packages
//! by id, Helm-style.

use chrono::{DateTime, Utc};
use pkgmirror_core::{PackageIdentity, VersionConstraint, parse_version};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::error::{RepoError, Result};

/// Feed index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedIndex {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// When this index was generated
    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,

    /// Packages indexed by id
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<PackageEntry>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for FeedIndex {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

impl FeedIndex {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
            message: e.to_string(),
        })
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    /// Serialize index to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// All entries for a package id
    ///
    /// Entries filed under the id but naming another package are skipped.
    pub fn get(&self, id: &str) -> Vec<&PackageEntry> {
        self.entries
            .get(id)
            .into_iter()
            .flatten()
            .filter(|entry| {
                let listed = entry.id == id;
                if !listed {
                    tracing::debug!("Skipping {} {} listed under {}", entry.id, entry.version, id);
                }
                listed
            })
            .collect()
    }

    /// Parsed versions of a package, skipping entries with unparseable versions
    pub fn versions(&self, id: &str) -> Vec<Version> {
        self.get(id)
            .into_iter()
            .filter_map(|entry| match entry.identity() {
                Ok(identity) => Some(identity.version),
                Err(e) => {
                    tracing::debug!("Skipping {} {}: {}", entry.id, entry.version, e);
                    None
                }
            })
            .collect()
    }

    /// Entry for an exact identity
    ///
    /// Versions are compared after parsing, so `1.2` matches `1.2.0`.
    pub fn find(&self, identity: &PackageIdentity) -> Option<&PackageEntry> {
        self.get(&identity.id).into_iter().find(|entry| {
            parse_version(&entry.version)
                .map(|v| v == identity.version)
                .unwrap_or(false)
        })
    }

    /// Add an entry and refresh the generation timestamp
    pub fn add_entry(&mut self, entry: PackageEntry) {
        self.entries.entry(entry.id.clone()).or_default().push(entry);
        self.generated = Utc::now();
    }
}

/// One package version in a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    pub id: String,

    #[serde(deserialize_with = "pkgmirror_core::deserialize_version_text")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Archive locations, absolute or relative to the feed root
    #[serde(default)]
    pub urls: Vec<String>,

    /// `sha256:<hex>` digest of the archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyEntry>,
}

impl PackageEntry {
    /// Create a bare entry for an identity
    pub fn new(identity: &PackageIdentity) -> Self {
        Self {
            id: identity.id.clone(),
            version: identity.version.to_string(),
            description: None,
            urls: Vec::new(),
            digest: None,
            created: None,
            dependencies: Vec::new(),
        }
    }

    /// Parsed identity of this entry
    pub fn identity(&self) -> Result<PackageIdentity> {
        Ok(PackageIdentity::parse(&self.id, &self.version)?)
    }

    /// First archive location
    pub fn archive_path(&self) -> Result<&str> {
        self.urls
            .first()
            .map(String::as_str)
            .ok_or_else(|| RepoError::InvalidEntry {
                message: format!("{} {} has no archive URL", self.id, self.version),
            })
    }

    /// Absolute archive URL, resolving relative locations against `base_url`
    pub fn download_url(&self, base_url: &str) -> Result<String> {
        let location = self.archive_path()?;
        if let Ok(url) = Url::parse(location) {
            return Ok(url.to_string());
        }
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        Ok(base.join(location)?.to_string())
    }

    /// Check the payload against the recorded digest, if any
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        let Some(expected) = &self.digest else {
            return Ok(());
        };
        let actual = compute_digest(payload);
        if !digest_matches(expected, &actual) {
            return Err(RepoError::IntegrityCheckFailed {
                name: format!("{} {}", self.id, self.version),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Declared dependency of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub id: String,

    /// Constraint text; absent means latest
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "pkgmirror_core::deserialize_optional_version_text"
    )]
    pub version: Option<String>,
}

impl DependencyEntry {
    pub fn new(id: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            id: id.into(),
            version: version.map(String::from),
        }
    }

    pub fn constraint(&self) -> Result<VersionConstraint> {
        match &self.version {
            Some(v) => Ok(VersionConstraint::parse(v)?),
            None => Ok(VersionConstraint::Unconstrained),
        }
    }
}

/// Compute SHA256 digest of data
pub fn compute_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Check if two digests match (supports various formats)
pub fn digest_matches(expected: &str, actual: &str) -> bool {
    fn normalize(digest: &str) -> String {
        digest
            .trim()
            .to_lowercase()
            .replace("sha256:", "")
            .replace("sha256-", "")
    }
    normalize(expected) == normalize(actual)
}
