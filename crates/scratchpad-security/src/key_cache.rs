//! Bounded, time-limited cache of decoding keys indexed by key id.
//!
//! Only successfully resolved keys are stored. A failed fetch is returned to the
//! caller and the next lookup for the same key id fetches again.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::DecodingKey;
use moka::future::Cache;
use tracing::debug;

use crate::error::AuthError;
use crate::jwks::KeySource;

pub struct SigningKeyCache {
    cache: Cache<String, Arc<DecodingKey>>,
}

impl SigningKeyCache {
    pub fn new(max_entries: u64, max_age: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(max_age)
            .build();
        Self { cache }
    }

    /// Returns the cached key for `kid`, fetching the key set from `source` on a miss.
    pub async fn get_or_fetch(
        &self,
        kid: &str,
        source: &dyn KeySource,
    ) -> Result<Arc<DecodingKey>, AuthError> {
        if let Some(key) = self.cache.get(kid).await {
            debug!(kid, "Signing key cache hit");
            return Ok(key);
        }

        debug!(kid, "Signing key cache miss");
        let key_set = source.fetch_key_set().await?;

        let jwk = key_set.find(kid).ok_or_else(|| {
            AuthError::SignatureInvalid(format!("no signing key published for kid '{kid}'"))
        })?;
        let key = DecodingKey::from_jwk(jwk)
            .map(Arc::new)
            .map_err(|e| AuthError::SignatureInvalid(format!("unusable signing key: {e}")))?;

        self.cache.insert(kid.to_string(), key.clone()).await;
        Ok(key)
    }

    #[cfg(test)]
    async fn contains(&self, kid: &str) -> bool {
        self.cache.get(kid).await.is_some()
    }
}
