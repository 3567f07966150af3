//! Signing key retrieval

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use tracing::debug;

use crate::error::AuthError;

/// Source of the authority's published signing keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_key_set(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches a JWKS document over HTTPS.
pub struct HttpKeySource {
    client: reqwest::Client,
    jwks_uri: String,
}

impl HttpKeySource {
    pub fn new(jwks_uri: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            jwks_uri: jwks_uri.into(),
        })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_key_set(&self) -> Result<JwkSet, AuthError> {
        debug!(jwks_uri = %self.jwks_uri, "Fetching signing keys");

        let response = self
            .client
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::UpstreamUnavailable(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(format!("invalid key set: {e}")))
    }
}
