//! Credentials handed to upstream providers.
//!
//! Providers receive a [`CredentialProvider`] at construction and ask it for a
//! token on every request; nothing is cached at module level.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Bearer token to send upstream, if any.
    async fn token(&self) -> Result<Option<String>>;
}

/// For public endpoints.
pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    async fn token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A fixed token for the lifetime of the process.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: &str) -> Self {
        StaticToken {
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(Some(self.token.clone()))
    }
}

/// Adds the bearer header when a token is present.
pub fn with_token(request: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}
