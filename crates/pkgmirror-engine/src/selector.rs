//! Package selection
//!
//! A subject is either a bare package id or the path of a manifest list.

use pkgmirror_core::{
    ManifestList, MirrorRequest, PackageReference, VersionConstraint, is_manifest_path,
    parse_version, validate_package_id,
};
use std::path::Path;

use crate::error::{MirrorError, Result};

/// Reads the ordered package references of a manifest list
pub trait ManifestReader: Send + Sync {
    /// Fails when the path does not resolve, never returns an empty list instead
    fn read(&self, path: &Path) -> pkgmirror_core::Result<Vec<PackageReference>>;
}

/// Reads `packages.yaml` files
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlManifestReader;

impl ManifestReader for YamlManifestReader {
    fn read(&self, path: &Path) -> pkgmirror_core::Result<Vec<PackageReference>> {
        ManifestList::load(path)?.references()
    }
}

/// Turns a command subject into mirror requests
pub struct PackageSelector {
    reader: Box<dyn ManifestReader>,
    allow_prerelease: bool,
    ignore_dependencies: bool,
}

impl Default for PackageSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageSelector {
    pub fn new() -> Self {
        Self::with_reader(YamlManifestReader)
    }

    pub fn with_reader(reader: impl ManifestReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            allow_prerelease: false,
            ignore_dependencies: false,
        }
    }

    pub fn allow_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = allow;
        self
    }

    pub fn ignore_dependencies(mut self, ignore: bool) -> Self {
        self.ignore_dependencies = ignore;
        self
    }

    /// Produce requests in mirror order
    ///
    /// An explicit version with a manifest list is rejected before the
    /// manifest is read.
    pub fn select(&self, subject: &str, version: Option<&str>) -> Result<Vec<MirrorRequest>> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(MirrorError::configuration("no package id or manifest list given"));
        }

        if is_manifest_path(subject) {
            if version.is_some() {
                return Err(MirrorError::configuration(format!(
                    "a version cannot be given together with the manifest list '{}'",
                    subject
                )));
            }
            return self.select_list(Path::new(subject));
        }

        validate_package_id(subject)?;
        let constraint = match version {
            Some(v) => VersionConstraint::Exact(parse_version(v)?),
            None => VersionConstraint::Unconstrained,
        };

        Ok(vec![
            MirrorRequest::new(subject)
                .with_constraint(constraint)
                .allow_prerelease(self.allow_prerelease)
                .ignore_dependencies(self.ignore_dependencies),
        ])
    }

    fn select_list(&self, path: &Path) -> Result<Vec<MirrorRequest>> {
        let references = self.reader.read(path)?;
        tracing::debug!("Read {} entries from {}", references.len(), path.display());

        Ok(references
            .into_iter()
            .map(|reference| {
                // A pinned version is always eligible, prerelease or not
                let allow_prerelease = reference.constraint.is_exact() || self.allow_prerelease;
                MirrorRequest::new(reference.id)
                    .with_constraint(reference.constraint)
                    .allow_prerelease(allow_prerelease)
                    .ignore_dependencies(self.ignore_dependencies)
            })
            .collect())
    }
}
