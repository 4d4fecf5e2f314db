//! HTTP client with redirect protection
//!
//! Redirects are followed by hand so that credentials are only attached
//! while the request stays on the original origin.

use std::time::Duration;
use url::Url;

use crate::credentials::ScopedCredentials;
use crate::error::{RepoError, Result};

/// Default per-request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const MAX_REDIRECTS: u32 = 10;

/// Secure HTTP client wrapper
pub struct SecureHttpClient {
    client: reqwest::Client,
    credentials: ScopedCredentials,
}

impl SecureHttpClient {
    /// Create a new client; `timeout` overrides the default request timeout
    pub fn new(credentials: ScopedCredentials, timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Redirects are handled in `get` to keep credentials on-origin
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout.unwrap_or(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .user_agent(concat!("pkgmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// Create without credentials (public feeds)
    pub fn public() -> Result<Self> {
        Self::new(ScopedCredentials::default(), None)
    }

    /// Fetch a URL, following redirects
    ///
    /// Credentials are never sent after a cross-origin redirect.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let original_url = url.to_string();
        let mut current_url = url.to_string();
        let mut redirects = 0;

        loop {
            let mut request = self.client.get(&current_url);

            if ScopedCredentials::same_origin(&original_url, &current_url) {
                if let Some(creds) = self.credentials.for_url(&current_url) {
                    request = request.header("Authorization", creds.auth_header());
                }
            } else {
                tracing::warn!(
                    "Cross-origin redirect from {} to {} - credentials not forwarded",
                    original_url,
                    current_url
                );
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_redirection() {
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    return Err(RepoError::NetworkError {
                        message: format!("Too many redirects (max {})", MAX_REDIRECTS),
                    });
                }

                let location = response
                    .headers()
                    .get("Location")
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| RepoError::NetworkError {
                        message: "Redirect without Location header".to_string(),
                    })?;

                let base = Url::parse(&current_url)?;
                current_url = base.join(location)?.to_string();
                continue;
            }

            return check_status(response, &current_url);
        }
    }

    /// Fetch bytes from URL
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|e| RepoError::NetworkError {
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Upload a package archive
    ///
    /// A 409 answer is returned as `HttpError { status: 409 }` for the
    /// caller to interpret.
    pub async fn put(&self, url: &str, body: Vec<u8>, api_key: Option<&str>) -> Result<()> {
        let mut request = self
            .client
            .put(url)
            .header("Content-Type", "application/gzip")
            .body(body);

        if let Some(key) = api_key {
            request = request.header("X-Api-Key", key);
        }
        if let Some(creds) = self.credentials.for_url(url) {
            request = request.header("Authorization", creds.auth_header());
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_client_error()
            && status != reqwest::StatusCode::CONFLICT
            && status != reqwest::StatusCode::UNAUTHORIZED
            && status != reqwest::StatusCode::FORBIDDEN
            && status != reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            let message = response.text().await.unwrap_or_default();
            return Err(RepoError::PushRejected {
                locator: url.to_string(),
                message: if message.is_empty() {
                    format!("server answered {}", status.as_u16())
                } else {
                    message
                },
            });
        }

        check_status(response, url).map(|_| ())
    }
}

/// Map non-success statuses to errors
fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        return Err(RepoError::RateLimited { retry_after });
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(RepoError::AuthRequired {
            url: url.to_string(),
        });
    }
    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(RepoError::AuthFailed {
            message: format!("Access denied to {}", url),
        });
    }
    if !status.is_success() {
        return Err(RepoError::HttpError {
            status: status.as_u16(),
            message: format!("Request to {} failed", url),
        });
    }

    Ok(response)
}
