use axum::{extract::State, Json};
use serde::Serialize;
use scratchpad_shared::Settings;

use crate::state::AppState;

pub const RESOURCE_METADATA_PATH: &str = "/.well-known/oauth-protected-resource";

/// Protected resource metadata, so clients can discover how to obtain a token.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceMetadata {
    pub resource_id: String,
    pub issuer: String,
    pub scopes_supported: Vec<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub resource_metadata_uri: String,
}

impl ResourceMetadata {
    pub fn from_settings(settings: &Settings) -> Self {
        let authority = &settings.authority;
        Self {
            resource_id: authority.audience.clone(),
            issuer: authority.issuer(),
            scopes_supported: authority.allowed_scopes.clone(),
            authorization_endpoint: authority.authorization_endpoint(),
            token_endpoint: authority.token_endpoint(),
            jwks_uri: authority.jwks_uri(),
            resource_metadata_uri: format!(
                "{}{}",
                settings.server.base_url.trim_end_matches('/'),
                RESOURCE_METADATA_PATH
            ),
        }
    }
}

pub async fn protected_resource_metadata(State(state): State<AppState>) -> Json<ResourceMetadata> {
    Json(state.resource_metadata.as_ref().clone())
}
