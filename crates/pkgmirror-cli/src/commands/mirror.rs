//! Mirror command - copy packages and their dependencies to a destination

use clap::Args;
use console::style;
use pkgmirror_engine::{MirrorOptions, Mirrorer, OperationScope, PackageSelector};
use pkgmirror_repo::{
    AggregateSource, CredentialStore, MirrorConfig, PackageCache, RepositoryTarget,
    normalize_timeout,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::display::{ConsoleObserver, print_summary};
use crate::error::{CliError, Result};

#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Package id, or path of a manifest list (packages.yaml)
    pub subject: String,

    /// Destination feed queried for existing packages
    pub pull: String,

    /// Destination feed packages are published to
    pub push: String,

    /// Source feed locator or configured feed name (repeatable)
    #[arg(short = 's', long = "source")]
    pub sources: Vec<String>,

    /// Exact version to mirror (single package only)
    #[arg(long = "version")]
    pub version: Option<String>,

    /// API key for the push destination
    #[arg(long, env = "PKGMIRROR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Consider prerelease versions
    #[arg(long)]
    pub prerelease: bool,

    /// Mirror only the requested packages
    #[arg(long)]
    pub ignore_dependencies: bool,

    /// Publish timeout in seconds (0 = 300)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub timeout: i64,

    /// Do not use the local package cache
    #[arg(long)]
    pub no_cache: bool,

    /// Report what would be mirrored without transferring anything
    #[arg(long, visible_alias = "noop")]
    pub simulate: bool,

    /// Fail when any source feed fails instead of skipping it
    #[arg(long)]
    pub strict_sources: bool,

    /// Alternate configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn run(args: MirrorArgs) -> Result<()> {
    let requests = PackageSelector::new()
        .allow_prerelease(args.prerelease)
        .ignore_dependencies(args.ignore_dependencies)
        .select(&args.subject, args.version.as_deref())?;

    let config = match &args.config {
        Some(path) => MirrorConfig::load_from(path)?,
        None => MirrorConfig::load()?,
    };
    let credentials = CredentialStore::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring credential store: {}", e);
        CredentialStore::default()
    });

    let endpoints = if args.sources.is_empty() {
        config.endpoints()?
    } else {
        args.sources
            .iter()
            .map(|locator| config.resolve(locator))
            .collect::<pkgmirror_repo::Result<Vec<_>>>()?
    };
    if endpoints.is_empty() {
        return Err(CliError::usage_with_help(
            "no source feeds",
            "Pass --source or list feeds in the configuration file",
        ));
    }

    let mut source = AggregateSource::from_endpoints(endpoints, &credentials)?
        .ignore_failing_repositories(!args.strict_sources);
    if !args.no_cache {
        match PackageCache::open() {
            Ok(cache) => source = source.with_cache(Arc::new(cache)),
            Err(e) => tracing::warn!("Package cache unavailable: {}", e),
        }
    }

    let pull = config.resolve(&args.pull)?;
    let push = config.resolve(&args.push)?;
    let api_key = args
        .api_key
        .clone()
        .or_else(|| credentials.api_key_for(&push.locator).map(String::from));
    let seconds = match args.timeout {
        0 => config.default_timeout.unwrap_or(0),
        seconds => seconds,
    };
    let target = RepositoryTarget::open(
        &pull,
        &push,
        api_key,
        normalize_timeout(seconds),
        &credentials,
    )?;

    println!(
        "{} {} from {} to {}",
        style(if args.simulate { "Simulating" } else { "Mirroring" }).cyan().bold(),
        args.subject,
        source.feed_names().join(", "),
        push.locator
    );

    let mirrorer = Mirrorer::new(source, target)
        .with_options(MirrorOptions {
            simulate: args.simulate,
        })
        .with_observer(Arc::new(ConsoleObserver::new(args.simulate)));

    let report = OperationScope::new()
        .run("mirror", &args.subject, mirrorer.mirror_all(&requests))
        .await?;

    print_summary(&report, args.simulate);
    Ok(())
}
