//! Package identities
//!
//! A package is identified by its id and an exact semantic version. Presence at a
//! destination is always decided by identity equality, never by content.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// An exact package id and version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Build an identity from a textual version, see [`parse_version`]
    ///
    /// The id is checked with [`validate_package_id`].
    pub fn parse(id: impl Into<String>, version: &str) -> Result<Self> {
        let id = id.into();
        validate_package_id(&id)?;
        Ok(Self::new(id, parse_version(version)?))
    }

    /// Whether the version carries a prerelease tag
    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Check that a package id can name a file and a URL path segment
///
/// Ids come from remote indexes and end up in archive file names, so
/// separators, `..` and control characters are rejected.
pub fn validate_package_id(id: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(CoreError::InvalidPackageId {
            id: id.to_string(),
            reason: reason.to_string(),
        })
    };

    if id.trim().is_empty() {
        return invalid("empty");
    }
    if id.contains(['/', '\\']) {
        return invalid("contains a path separator");
    }
    if id.contains("..") || id == "." {
        return invalid("contains a relative path component");
    }
    if id.chars().any(char::is_control) {
        return invalid("contains a control character");
    }
    Ok(())
}

/// Parse a version leniently
///
/// Accepts everything `semver` accepts, plus a leading `v` and short forms
/// (`1` and `1.2` become `1.0.0` and `1.2.0`, prerelease tags are kept).
pub fn parse_version(input: &str) -> Result<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    let invalid = |message: String| CoreError::InvalidVersion {
        version: input.to_string(),
        message,
    };

    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();

    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid("expected MAJOR[.MINOR[.PATCH]]".to_string()));
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|e| invalid(e.to_string()))
}

/// Version text as written in YAML, quoted or not
#[derive(Deserialize)]
#[serde(untagged)]
enum VersionText {
    Text(String),
    Number(serde_yaml::Number),
}

impl From<VersionText> for String {
    fn from(text: VersionText) -> Self {
        match text {
            VersionText::Text(s) => s,
            VersionText::Number(n) => n.to_string(),
        }
    }
}

/// Deserialize a version field, accepting unquoted numbers like `version: 2.0`
pub fn deserialize_version_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    VersionText::deserialize(deserializer).map(String::from)
}

/// Optional variant of [`deserialize_version_text`]
pub fn deserialize_optional_version_text<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text: Option<VersionText> = Option::deserialize(deserializer)?;
    Ok(text.map(String::from))
}
