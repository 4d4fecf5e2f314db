//! Endpoint locators and configuration
//!
//! Named feeds are stored in `~/.config/pkgmirror/config.yaml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Named feeds, used as default sources when none are given
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,

    /// Publish timeout in seconds
    #[serde(default)]
    pub default_timeout: Option<i64>,
}

fn default_api_version() -> String {
    "pkgmirror.io/v1".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            feeds: Vec::new(),
            default_timeout: None,
        }
    }
}

impl MirrorConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("pkgmirror").join("config.yaml"))
    }

    /// Get a feed by name
    pub fn get(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.name == name)
    }

    /// Turn a command-line locator into an endpoint
    ///
    /// A configured feed name wins over a same-named relative path.
    pub fn resolve(&self, locator: &str) -> Result<Endpoint> {
        match self.get(locator) {
            Some(feed) => feed.endpoint(),
            None => Endpoint::from_locator(locator),
        }
    }

    /// All configured feeds as endpoints, in file order
    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        self.feeds.iter().map(FeedConfig::endpoint).collect()
    }
}

/// Named feed definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    /// Unique name for this feed
    pub name: String,

    /// Feed URL or directory
    pub url: String,

    /// Credential reference name (stored separately)
    #[serde(default)]
    pub credential_ref: Option<String>,
}

impl FeedConfig {
    pub fn endpoint(&self) -> Result<Endpoint> {
        let mut endpoint = Endpoint::new(&self.name, &self.url)?;
        endpoint.credential_ref = Some(
            self.credential_ref
                .clone()
                .unwrap_or_else(|| self.name.clone()),
        );
        Ok(endpoint)
    }
}

/// A single addressable feed, readable or writable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Display name
    pub name: String,

    /// URL or filesystem path
    pub locator: String,

    /// Local directory or remote HTTP feed
    pub kind: EndpointKind,

    /// Key into the credential store
    pub credential_ref: Option<String>,
}

impl Endpoint {
    /// Create a named endpoint
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let locator = locator.into();
        let kind = EndpointKind::detect(&locator)?;

        Ok(Self {
            name,
            locator,
            kind,
            credential_ref: None,
        })
    }

    /// Create an endpoint named after its locator
    pub fn from_locator(locator: &str) -> Result<Self> {
        Self::new(locator, locator)
    }

    /// Filesystem path for local endpoints
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.kind {
            EndpointKind::Local => Some(PathBuf::from(
                self.locator
                    .strip_prefix("file://")
                    .unwrap_or(&self.locator),
            )),
            EndpointKind::Remote => None,
        }
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        self.locator.trim_end_matches('/')
    }

    /// Get the index URL for remote endpoints
    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.base_url())
    }
}

/// Endpoint kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// Directory on the local filesystem
    Local,

    /// HTTP(S) feed
    Remote,
}

impl EndpointKind {
    /// Auto-detect endpoint kind from a locator
    pub fn detect(locator: &str) -> Result<Self> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(RepoError::InvalidLocator {
                locator: locator.to_string(),
                reason: "locator is empty".to_string(),
            });
        }

        match trimmed.split_once("://") {
            Some((scheme, _)) => match scheme.to_ascii_lowercase().as_str() {
                "http" | "https" => Ok(EndpointKind::Remote),
                "file" => Ok(EndpointKind::Local),
                other => Err(RepoError::InvalidLocator {
                    locator: locator.to_string(),
                    reason: format!(
                        "unsupported scheme '{}', expected http://, https://, file:// or a path",
                        other
                    ),
                }),
            },
            None => Ok(EndpointKind::Local),
        }
    }

    /// Relative cost of querying this kind of endpoint
    pub(crate) fn cost(self) -> u8 {
        match self {
            EndpointKind::Local => 0,
            EndpointKind::Remote => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_kind_detection() {
        assert_eq!(
            EndpointKind::detect("https://feeds.example.com/stable").unwrap(),
            EndpointKind::Remote
        );
        assert_eq!(
            EndpointKind::detect("HTTP://feeds.example.com").unwrap(),
            EndpointKind::Remote
        );
        assert_eq!(
            EndpointKind::detect("file:///srv/feed").unwrap(),
            EndpointKind::Local
        );
        assert_eq!(EndpointKind::detect("./feed").unwrap(), EndpointKind::Local);
        assert_eq!(EndpointKind::detect("/srv/feed").unwrap(), EndpointKind::Local);

        assert!(EndpointKind::detect("ftp://example.com").is_err());
        assert!(EndpointKind::detect("  ").is_err());
    }

    #[test]
    fn test_local_path() {
        let endpoint = Endpoint::from_locator("file:///srv/feed").unwrap();
        assert_eq!(endpoint.local_path(), Some(PathBuf::from("/srv/feed")));

        let remote = Endpoint::from_locator("https://example.com/feed/").unwrap();
        assert!(remote.local_path().is_none());
        assert_eq!(remote.index_url(), "https://example.com/feed/index.yaml");
    }

    #[test]
    fn test_resolve_named_feed() {
        let config: MirrorConfig = serde_yaml::from_str(
            r#"
feeds:
  - name: upstream
    url: https://feeds.example.com/v1
    credentialRef: corp
  - name: local
    url: /srv/feed
defaultTimeout: 60
"#,
        )
        .unwrap();

        let upstream = config.resolve("upstream").unwrap();
        assert_eq!(upstream.name, "upstream");
        assert_eq!(upstream.locator, "https://feeds.example.com/v1");
        assert_eq!(upstream.credential_ref.as_deref(), Some("corp"));

        let local = config.resolve("local").unwrap();
        assert_eq!(local.credential_ref.as_deref(), Some("local"));

        let direct = config.resolve("https://other.example.com").unwrap();
        assert_eq!(direct.kind, EndpointKind::Remote);
        assert!(direct.credential_ref.is_none());

        assert_eq!(config.endpoints().unwrap().len(), 2);
        assert_eq!(config.default_timeout, Some(60));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "feeds:\n  - name: a\n    url: https://a.example.com\n").unwrap();

        let config = MirrorConfig::load_from(&path).unwrap();
        assert_eq!(config.api_version, "pkgmirror.io/v1");
        assert!(config.get("a").is_some());
    }
}
