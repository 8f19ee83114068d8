//! Bearer token providers.
//!
//! Tokens are short-lived: the client asks for a fresh one on every
//! connect attempt and never caches it across reconnects.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use gala_core::config::ServerConfig;
use gala_core::error::{GalaError, GalaResult};

/// Options passed to a token request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenOptions {
    /// Bypass any provider-side cache.
    pub skip_cache: bool,
}

/// Supplies bearer tokens for the socket URL. May be slow or fail.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, options: &TokenOptions) -> GalaResult<String>;
}

/// Always returns the same token. Useful for CLI flags and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _options: &TokenOptions) -> GalaResult<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken", alias = "jwt")]
    token: String,
}

/// Fetches tokens from an HTTP endpoint answering `{"token": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    client: Client,
    url: String,
    credential: Option<String>,
}

impl HttpTokenProvider {
    pub fn new(url: impl Into<String>, credential: Option<String>, timeout: Duration) -> GalaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GalaError::Http(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            credential,
        })
    }

    /// Build from the `[server]` config section.
    pub fn from_config(config: &ServerConfig) -> GalaResult<Self> {
        if config.token_url.is_empty() {
            return Err(GalaError::MissingConfig("server.token_url".into()));
        }
        Self::new(
            config.token_url.clone(),
            config.token_credential.clone(),
            Duration::from_millis(config.connect_timeout_ms),
        )
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn token(&self, options: &TokenOptions) -> GalaResult<String> {
        let mut request = self.client.get(&self.url);
        if options.skip_cache {
            request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }
        if let Some(ref credential) = self.credential {
            request = request.bearer_auth(credential);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GalaError::Token(format!("token request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GalaError::Token(format!("token endpoint returned {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| GalaError::Token(format!("token response unreadable: {e}")))?;
        if body.token.is_empty() {
            return Err(GalaError::Token("token endpoint returned an empty token".into()));
        }
        debug!("fetched fresh token from {}", self.url);
        Ok(body.token)
    }
}
