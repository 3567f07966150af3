use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use scratchpad_security::AuthError;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Verifies the bearer token and stores the resulting `Identity` in request extensions.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::MissingCredentials)?;

    let identity = state.verifier.verify(&token).await?;

    debug!(
        user_id = %identity.object_id(),
        username = identity.display_name().unwrap_or_default(),
        scopes = ?identity.granted_scopes(),
        "User authenticated"
    );

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
