//! The mirrorer
//!
//! For every request the mirrorer resolves one identity, skips it if the
//! session or the destination already has it, mirrors its dependencies
//! first and finally transfers the package itself.
//!
//! Per-package failures (`NotFound`, `TransferFailed`) are recorded and the
//! batch continues. Feed errors in strict mode and destination query errors
//! end the batch.

use futures::future::BoxFuture;
use pkgmirror_core::{MirrorRequest, PackageIdentity, validate_package_id};
use pkgmirror_repo::{AggregateSource, PackageEntry, RepoError, RepositoryTarget};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Result of mirroring one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// Transferred (or would have been, when simulating)
    Mirrored,
    /// The destination or this session already had it
    AlreadyPresent,
    /// No source carries a matching version
    NotFound,
    /// Download or publish failed
    TransferFailed(String),
}

impl MirrorOutcome {
    pub fn is_mirrored(&self) -> bool {
        matches!(self, MirrorOutcome::Mirrored)
    }
}

impl fmt::Display for MirrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorOutcome::Mirrored => write!(f, "mirrored"),
            MirrorOutcome::AlreadyPresent => write!(f, "already present"),
            MirrorOutcome::NotFound => write!(f, "not found"),
            MirrorOutcome::TransferFailed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One recorded outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    /// The request as the user would recognise it, e.g. `Foo (^1.2)`
    pub request: String,
    /// Resolved identity; absent when resolution failed
    pub identity: Option<PackageIdentity>,
    pub outcome: MirrorOutcome,
    /// Whether the package was pulled in as a dependency
    pub dependency: bool,
}

impl fmt::Display for PackageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(identity) => write!(f, "{}", identity),
            None => write!(f, "{}", self.request),
        }
    }
}

/// State of one batch: visited identities and the outcome log
#[derive(Debug, Default)]
pub struct MirrorSession {
    visited: HashSet<PackageIdentity>,
    outcomes: Vec<PackageOutcome>,
}

impl MirrorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, identity: &PackageIdentity) -> bool {
        self.visited.contains(identity)
    }

    /// Mark an identity visited; returns false if it already was
    pub fn visit(&mut self, identity: PackageIdentity) -> bool {
        self.visited.insert(identity)
    }

    pub fn outcomes(&self) -> &[PackageOutcome] {
        &self.outcomes
    }

    fn record(&mut self, outcome: PackageOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn into_report(self) -> MirrorReport {
        MirrorReport {
            outcomes: self.outcomes,
        }
    }
}

/// Outcomes of a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub outcomes: Vec<PackageOutcome>,
}

impl MirrorReport {
    /// True iff at least one package was mirrored
    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(|o| o.outcome.is_mirrored())
    }

    pub fn mirrored(&self) -> usize {
        self.count(|o| matches!(o, MirrorOutcome::Mirrored))
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, MirrorOutcome::AlreadyPresent))
    }

    pub fn not_found(&self) -> usize {
        self.count(|o| matches!(o, MirrorOutcome::NotFound))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MirrorOutcome::TransferFailed(_)))
    }

    fn count(&self, predicate: impl Fn(&MirrorOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.outcome)).count()
    }
}

/// Mirror behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorOptions {
    /// Compute outcomes without fetching or publishing anything
    pub simulate: bool,
}

/// Progress hooks
///
/// All methods default to no-ops.
pub trait MirrorObserver: Send + Sync {
    fn on_resolved(&self, _request: &MirrorRequest, _identity: &PackageIdentity) {}

    fn on_before_transfer(&self, _identity: &PackageIdentity) {}

    fn on_after_transfer(&self, _identity: &PackageIdentity, _outcome: &MirrorOutcome) {}

    /// Called for every recorded outcome
    fn on_outcome(&self, _outcome: &PackageOutcome) {}
}

/// Copies packages from a source to a target
pub struct Mirrorer {
    source: AggregateSource,
    target: RepositoryTarget,
    options: MirrorOptions,
    observers: Vec<Arc<dyn MirrorObserver>>,
}

impl Mirrorer {
    pub fn new(source: AggregateSource, target: RepositoryTarget) -> Self {
        Self {
            source,
            target,
            options: MirrorOptions::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: MirrorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn MirrorObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Mirror every request in order
    pub async fn mirror_all(&self, requests: &[MirrorRequest]) -> Result<MirrorReport> {
        let mut session = MirrorSession::new();
        for request in requests {
            self.mirror(request, &mut session).await?;
        }
        Ok(session.into_report())
    }

    /// Mirror one request and its dependencies
    pub async fn mirror(
        &self,
        request: &MirrorRequest,
        session: &mut MirrorSession,
    ) -> Result<MirrorOutcome> {
        self.mirror_request(request.clone(), session, false).await
    }

    fn mirror_request<'a>(
        &'a self,
        request: MirrorRequest,
        session: &'a mut MirrorSession,
        dependency: bool,
    ) -> BoxFuture<'a, Result<MirrorOutcome>> {
        Box::pin(async move {
            if let Err(e) = validate_package_id(&request.id) {
                tracing::warn!("Skipping {}: {}", request, e);
                return Ok(self.finish(session, &request, None, MirrorOutcome::NotFound, dependency));
            }

            // Exact requests skip the source lookup until a transfer needs metadata
            let (identity, mut entry) = match request.constraint.exact_version() {
                Some(version) => (PackageIdentity::new(&request.id, version.clone()), None),
                None => match self.source.resolve(&request).await? {
                    Some(entry) => (entry.identity()?, Some(entry)),
                    None => {
                        tracing::warn!("No version of {} found in any source", request);
                        return Ok(self.finish(session, &request, None, MirrorOutcome::NotFound, dependency));
                    }
                },
            };

            for observer in &self.observers {
                observer.on_resolved(&request, &identity);
            }

            if session.is_visited(&identity) {
                if !dependency {
                    self.finish(
                        session,
                        &request,
                        Some(identity),
                        MirrorOutcome::AlreadyPresent,
                        dependency,
                    );
                }
                return Ok(MirrorOutcome::AlreadyPresent);
            }
            session.visit(identity.clone());

            if self.target.exists(&identity).await? {
                tracing::debug!("{} already present at destination", identity);
                return Ok(self.finish(
                    session,
                    &request,
                    Some(identity),
                    MirrorOutcome::AlreadyPresent,
                    dependency,
                ));
            }

            if entry.is_none() {
                entry = self.source.entry(&identity).await?;
            }
            let Some(entry) = entry else {
                tracing::warn!("{} not found in any source", identity);
                return Ok(self.finish(
                    session,
                    &request,
                    Some(identity),
                    MirrorOutcome::NotFound,
                    dependency,
                ));
            };

            if !request.ignore_dependencies {
                self.mirror_dependencies(&request, &entry, session).await?;
            }

            for observer in &self.observers {
                observer.on_before_transfer(&identity);
            }

            let outcome = if self.options.simulate {
                tracing::info!("Would mirror {}", identity);
                MirrorOutcome::Mirrored
            } else {
                self.transfer(&identity, &entry).await?
            };

            for observer in &self.observers {
                observer.on_after_transfer(&identity, &outcome);
            }

            Ok(self.finish(session, &request, Some(identity), outcome, dependency))
        })
    }

    async fn mirror_dependencies(
        &self,
        parent: &MirrorRequest,
        entry: &PackageEntry,
        session: &mut MirrorSession,
    ) -> Result<()> {
        for dependency in &entry.dependencies {
            let constraint = match dependency.constraint() {
                Ok(constraint) => constraint,
                Err(e) => {
                    tracing::warn!("Ignoring dependency {} of {}: {}", dependency.id, entry.id, e);
                    let request = MirrorRequest::new(&dependency.id);
                    self.finish(session, &request, None, MirrorOutcome::NotFound, true);
                    continue;
                }
            };

            let request = MirrorRequest::new(&dependency.id)
                .with_constraint(constraint)
                .allow_prerelease(parent.allow_prerelease);
            self.mirror_request(request, session, true).await?;
        }
        Ok(())
    }

    /// Download and publish; per-package failures become outcomes
    async fn transfer(
        &self,
        identity: &PackageIdentity,
        entry: &PackageEntry,
    ) -> Result<MirrorOutcome> {
        let payload = match self.source.download(identity).await {
            Ok(payload) => payload,
            Err(e @ RepoError::AggregateFeed { .. }) => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Could not download {}: {}", identity, e);
                return Ok(MirrorOutcome::TransferFailed(e.to_string()));
            }
        };

        match self.target.publish(entry, payload).await {
            Ok(()) => {
                tracing::info!("Mirrored {} to {}", identity, self.target.push_locator());
                Ok(MirrorOutcome::Mirrored)
            }
            Err(RepoError::AlreadyExists { .. }) => {
                tracing::info!("{} was already published", identity);
                Ok(MirrorOutcome::AlreadyPresent)
            }
            Err(e) => {
                tracing::warn!("Could not publish {}: {}", identity, e);
                Ok(MirrorOutcome::TransferFailed(e.to_string()))
            }
        }
    }

    fn finish(
        &self,
        session: &mut MirrorSession,
        request: &MirrorRequest,
        identity: Option<PackageIdentity>,
        outcome: MirrorOutcome,
        dependency: bool,
    ) -> MirrorOutcome {
        let record = PackageOutcome {
            request: request.to_string(),
            identity,
            outcome: outcome.clone(),
            dependency,
        };
        for observer in &self.observers {
            observer.on_outcome(&record);
        }
        session.record(record);
        outcome
    }
}
