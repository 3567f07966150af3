//! Access token claims and validation rules

use jsonwebtoken::{decode_header, Algorithm, Header, Validation};
use serde::Deserialize;

use crate::error::AuthError;

/// `aud` may be a single string or an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AudienceClaim {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: Option<String>,
    pub aud: Option<AudienceClaim>,
    pub sub: Option<String>,
    pub oid: Option<String>,
    pub preferred_username: Option<String>,
    pub name: Option<String>,
    /// Space-delimited delegated scopes.
    pub scp: Option<String>,
    pub scope: Option<String>,
    pub exp: Option<u64>,
    pub nbf: Option<u64>,
}

impl AccessTokenClaims {
    /// Exact string equality; an array matches when any element is equal.
    pub fn has_audience(&self, expected: &str) -> bool {
        match &self.aud {
            Some(AudienceClaim::Single(aud)) => aud == expected,
            Some(AudienceClaim::Many(auds)) => auds.iter().any(|aud| aud == expected),
            None => false,
        }
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scp
            .as_deref()
            .or(self.scope.as_deref())
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Both `sub` and `oid` must be present and non-empty.
    pub fn identifiers(&self) -> Result<(&str, &str), AuthError> {
        let sub = self.sub.as_deref().filter(|s| !s.is_empty());
        let oid = self.oid.as_deref().filter(|s| !s.is_empty());
        match (sub, oid) {
            (Some(sub), Some(oid)) => Ok((sub, oid)),
            _ => Err(AuthError::MissingClaims),
        }
    }

    pub fn display_name(&self) -> Option<String> {
        self.preferred_username.clone().or_else(|| self.name.clone())
    }
}

/// RS256 only, issuer pinned. Audience is checked separately for exact matching.
pub fn build_validation(issuer: &str, leeway_secs: u64) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss"]);
    validation.validate_aud = false;
    validation.validate_nbf = true;
    validation.leeway = leeway_secs;
    validation
}

/// Parses the header and extracts the key id of an RS256 token.
pub fn signing_key_id(token: &str) -> Result<String, AuthError> {
    let header: Header = decode_header(token)?;
    if header.alg != Algorithm::RS256 {
        return Err(AuthError::MalformedToken(format!(
            "unsupported algorithm {:?}",
            header.alg
        )));
    }
    header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| AuthError::MalformedToken("token header has no key id".to_string()))
}
