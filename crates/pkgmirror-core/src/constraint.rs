//! Version constraints
//!
//! A constraint selects versions out of what a feed offers:
//! - **Unconstrained**: pick the latest eligible version
//! - **Exact**: one pinned version, always eligible even when it is a prerelease
//! - **Range**: a semver requirement such as `^1.2` or `>=2.0, <3.0`

use semver::{BuildMetadata, Prerelease, Version, VersionReq};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::identity::parse_version;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionConstraint {
    #[default]
    Unconstrained,
    Exact(Version),
    Range(VersionReq),
}

impl VersionConstraint {
    /// Parse a constraint from text
    ///
    /// Empty text and `*` are unconstrained. A version (optionally prefixed with
    /// `=`) is an exact pin. Anything else must be a semver requirement.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Unconstrained);
        }

        let pinned = trimmed.strip_prefix('=').unwrap_or(trimmed).trim();
        if let Ok(version) = parse_version(pinned) {
            return Ok(Self::Exact(version));
        }

        VersionReq::parse(trimmed)
            .map(Self::Range)
            .map_err(|e| CoreError::InvalidConstraint {
                constraint: input.to_string(),
                message: e.to_string(),
            })
    }

    /// Whether this constraint pins a single version
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    /// The pinned version, if any
    pub fn exact_version(&self) -> Option<&Version> {
        match self {
            Self::Exact(version) => Some(version),
            _ => None,
        }
    }

    /// Check whether a version is eligible under this constraint
    ///
    /// Prerelease versions are excluded unless `allow_prerelease` is set, except
    /// for an exact pin which is always eligible.
    pub fn allows(&self, version: &Version, allow_prerelease: bool) -> bool {
        let is_prerelease = !version.pre.is_empty();
        match self {
            Self::Exact(pinned) => pinned == version,
            Self::Unconstrained => allow_prerelease || !is_prerelease,
            Self::Range(req) => {
                if !is_prerelease {
                    req.matches(version)
                } else if !allow_prerelease {
                    false
                } else {
                    // semver only matches prereleases sharing a comparator's
                    // major.minor.patch; widen to the release they precede.
                    req.matches(version) || req.matches(&release_of(version))
                }
            }
        }
    }

    /// Pick the highest eligible version
    pub fn best_match<'a, I>(&self, versions: I, allow_prerelease: bool) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions
            .into_iter()
            .filter(|v| self.allows(v, allow_prerelease))
            .max()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconstrained => write!(f, "latest"),
            Self::Exact(version) => write!(f, "={}", version),
            Self::Range(req) => write!(f, "{}", req),
        }
    }
}

fn release_of(version: &Version) -> Version {
    Version {
        pre: Prerelease::EMPTY,
        build: BuildMetadata::EMPTY,
        ..version.clone()
    }
}
