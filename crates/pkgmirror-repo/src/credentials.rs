//! Feed credentials and push API keys
//!
//! Credentials live in `~/.config/pkgmirror/credentials.yaml`, separate from
//! the feed list so the config file can be shared:
//!
//! ```yaml
//! credentials:
//!   corp:
//!     type: basic
//!     username: ci
//!     password: hunter2
//! apiKeys:
//!   https://push.example.com: abc123
//! ```
//!
//! - Feed credentials are scoped to the feed URL prefix
//! - They are never forwarded across a cross-origin redirect
//! - API keys are matched to push locators by longest prefix

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::config::Endpoint;
use crate::error::{RepoError, Result};

/// Credential types supported
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Basic authentication (username/password)
    Basic { username: String, password: String },

    /// Bearer token authentication
    Bearer { token: String },

    /// Environment variable references (CI/CD friendly)
    Env {
        #[serde(rename = "usernameVar")]
        username_var: String,
        #[serde(rename = "passwordVar")]
        password_var: String,
    },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn from_env(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::Env {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Resolve credentials to actual values
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        match self {
            Credentials::Basic { username, password } => Ok(ResolvedCredentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            Credentials::Bearer { token } => Ok(ResolvedCredentials::Bearer {
                token: token.clone(),
            }),
            Credentials::Env {
                username_var,
                password_var,
            } => {
                let username = std::env::var(username_var).map_err(|_| RepoError::AuthFailed {
                    message: format!("Environment variable {} not set", username_var),
                })?;
                let password = std::env::var(password_var).map_err(|_| RepoError::AuthFailed {
                    message: format!("Environment variable {} not set", password_var),
                })?;
                Ok(ResolvedCredentials::Basic { username, password })
            }
        }
    }
}

/// Resolved credentials ready for use
#[derive(Debug, Clone)]
pub enum ResolvedCredentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl ResolvedCredentials {
    /// Authorization header value
    pub fn auth_header(&self) -> String {
        match self {
            ResolvedCredentials::Basic { username, password } => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{}:{}", username, password),
                );
                format!("Basic {}", encoded)
            }
            ResolvedCredentials::Bearer { token } => format!("Bearer {}", token),
        }
    }
}

/// Credential store - feed credentials by name plus push API keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStore {
    /// Credentials by feed name or credential reference
    #[serde(default)]
    credentials: HashMap<String, Credentials>,

    /// API keys by push locator prefix
    #[serde(default)]
    api_keys: HashMap<String, String>,
}

impl CredentialStore {
    /// Load credential store from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store: Self = serde_yaml::from_str(&content)?;
        Ok(store)
    }

    /// Get default credential store path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("pkgmirror").join("credentials.yaml"))
    }

    /// Store credentials under a name
    pub fn set(&mut self, name: &str, credentials: Credentials) {
        self.credentials.insert(name.to_string(), credentials);
    }

    pub fn get(&self, name: &str) -> Option<&Credentials> {
        self.credentials.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.credentials.contains_key(name)
    }

    /// Store an API key for a push locator prefix
    pub fn set_api_key(&mut self, locator_prefix: &str, key: impl Into<String>) {
        self.api_keys
            .insert(locator_prefix.trim_end_matches('/').to_string(), key.into());
    }

    /// API key for a push locator (by longest matching prefix)
    pub fn api_key_for(&self, locator: &str) -> Option<&str> {
        self.api_keys
            .iter()
            .filter(|(prefix, _)| locator.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, key)| key.as_str())
    }

    /// Resolve credentials for an endpoint, if it references any
    pub fn credentials_for(&self, endpoint: &Endpoint) -> Result<Option<ResolvedCredentials>> {
        let Some(reference) = endpoint.credential_ref.as_deref() else {
            return Ok(None);
        };
        match self.get(reference) {
            Some(creds) => creds.resolve().map(Some),
            None => Ok(None),
        }
    }
}

/// Scoped credentials - maps URL prefixes to credentials
#[derive(Debug, Clone, Default)]
pub struct ScopedCredentials {
    scopes: HashMap<String, ResolvedCredentials>,
}

impl ScopedCredentials {
    /// Add credentials for a URL scope
    pub fn add(&mut self, url_prefix: &str, credentials: ResolvedCredentials) {
        let prefix = url_prefix.trim_end_matches('/').to_string();
        self.scopes.insert(prefix, credentials);
    }

    /// Get credentials for a URL (by longest matching prefix)
    pub fn for_url(&self, url: &str) -> Option<&ResolvedCredentials> {
        self.scopes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, creds)| creds)
    }

    /// Check if two URLs are same-origin (for redirect safety)
    pub fn same_origin(url1: &str, url2: &str) -> bool {
        match (Url::parse(url1), Url::parse(url2)) {
            (Ok(u1), Ok(u2)) => {
                u1.scheme() == u2.scheme()
                    && u1.host() == u2.host()
                    && u1.port_or_known_default() == u2.port_or_known_default()
            }
            _ => false,
        }
    }
}
