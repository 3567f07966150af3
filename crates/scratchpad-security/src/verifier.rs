//! Turns a bearer token into a verified [`Identity`]

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, Validation};
use scratchpad_shared::config::AuthoritySettings;
use tracing::{debug, error, warn};

use crate::error::AuthError;
use crate::identity::Identity;
use crate::jwks::KeySource;
use crate::jwt::{build_validation, signing_key_id, AccessTokenClaims};
use crate::key_cache::SigningKeyCache;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub issuer: String,
    pub audience: String,
    pub allowed_scopes: Vec<String>,
    pub leeway_secs: u64,
    pub key_cache_max_entries: u64,
    pub key_cache_max_age: Duration,
}

impl VerifierConfig {
    pub fn from_settings(authority: &AuthoritySettings) -> Self {
        Self {
            issuer: authority.issuer(),
            audience: authority.audience.clone(),
            allowed_scopes: authority.allowed_scopes.clone(),
            leeway_secs: authority.leeway_secs,
            key_cache_max_entries: authority.jwks_cache_max_entries,
            key_cache_max_age: Duration::from_secs(authority.jwks_cache_max_age_secs),
        }
    }
}

pub struct IdentityVerifier {
    config: VerifierConfig,
    validation: Validation,
    key_source: Arc<dyn KeySource>,
    key_cache: SigningKeyCache,
}

impl IdentityVerifier {
    pub fn new(config: VerifierConfig, key_source: Arc<dyn KeySource>) -> Self {
        let validation = build_validation(&config.issuer, config.leeway_secs);
        let key_cache = SigningKeyCache::new(config.key_cache_max_entries, config.key_cache_max_age);
        Self {
            config,
            validation,
            key_source,
            key_cache,
        }
    }

    pub fn allowed_scopes(&self) -> &[String] {
        &self.config.allowed_scopes
    }

    /// Verifies signature, issuer, audience, lifetime, identifiers and scopes.
    ///
    /// `InsufficientScope` is the only authorization failure; every other error
    /// means the caller could not be authenticated.
    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let kid = signing_key_id(token)?;

        let key = self
            .key_cache
            .get_or_fetch(&kid, self.key_source.as_ref())
            .await
            .inspect_err(|e| {
                if let AuthError::UpstreamUnavailable(detail) = e {
                    error!(kid = %kid, error = %detail, "Identity authority unavailable");
                }
            })?;

        let claims = decode::<AccessTokenClaims>(token, &key, &self.validation)
            .map_err(AuthError::from)
            .inspect_err(|e| debug!(reason = e.reason(), "Token rejected"))?
            .claims;

        if !claims.has_audience(&self.config.audience) {
            warn!(expected = %self.config.audience, "Token audience mismatch");
            return Err(AuthError::AudienceMismatch {
                expected: self.config.audience.clone(),
            });
        }

        let (subject_id, object_id) = claims.identifiers()?;

        let provided = claims.scopes();
        let granted: Vec<String> = provided
            .iter()
            .filter(|scope| self.config.allowed_scopes.contains(*scope))
            .cloned()
            .collect();

        if granted.is_empty() {
            warn!(
                user_id = %object_id,
                provided = ?provided,
                "Token lacks an accepted scope"
            );
            return Err(AuthError::InsufficientScope {
                required: self.config.allowed_scopes.clone(),
                provided,
            });
        }

        debug!(user_id = %object_id, scopes = ?granted, "Token verified");
        Ok(Identity::new(
            subject_id,
            object_id,
            claims.display_name(),
            granted,
        ))
    }
}
