//! Mirror requests

use std::fmt;

use crate::constraint::VersionConstraint;

/// One package to mirror, as produced by the package selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    pub id: String,
    pub constraint: VersionConstraint,
    pub allow_prerelease: bool,
    pub ignore_dependencies: bool,
}

impl MirrorRequest {
    /// Request the latest stable version of a package
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            constraint: VersionConstraint::Unconstrained,
            allow_prerelease: false,
            ignore_dependencies: false,
        }
    }

    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn allow_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = allow;
        self
    }

    pub fn ignore_dependencies(mut self, ignore: bool) -> Self {
        self.ignore_dependencies = ignore;
        self
    }
}

impl fmt::Display for MirrorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            VersionConstraint::Unconstrained => write!(f, "{}", self.id),
            constraint => write!(f, "{} ({})", self.id, constraint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_builder() {
        let request = MirrorRequest::new("Foo")
            .with_constraint(VersionConstraint::Exact(Version::new(1, 0, 0)))
            .allow_prerelease(true);

        assert_eq!(request.id, "Foo");
        assert!(request.constraint.is_exact());
        assert!(request.allow_prerelease);
        assert!(!request.ignore_dependencies);
    }

    #[test]
    fn test_display() {
        assert_eq!(MirrorRequest::new("Foo").to_string(), "Foo");
        let pinned = MirrorRequest::new("Foo")
            .with_constraint(VersionConstraint::Exact(Version::new(1, 2, 0)));
        assert_eq!(pinned.to_string(), "Foo (=1.2.0)");
    }
}
