use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use scratchpad_security::Identity;
use scratchpad_shared::constants::{SESSION_HEADER, SESSION_HEADER_ALIAS};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Session id from `Mcp-Session-Id`, falling back to `X-Session-Id`.
///
/// A header whose value is not visible ASCII is rejected rather than skipped,
/// since the id could not be echoed back.
pub fn session_id_from_headers(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    for name in [SESSION_HEADER, SESSION_HEADER_ALIAS] {
        let Some(value) = headers.get(name) else {
            continue;
        };
        let id = value.to_str().map_err(|_| ApiError::InvalidSessionId)?.trim();
        if !id.is_empty() {
            return Ok(Some(id.to_string()));
        }
    }
    Ok(None)
}

/// Resumes or creates the caller's session, stores it in request extensions and
/// echoes its id on the response.
pub async fn bind_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("identity missing from request".to_string()))?;

    let requested = session_id_from_headers(request.headers())?;
    let (session, is_new) = state
        .sessions
        .resume_or_create(requested.as_deref(), &identity)?;

    // Generated ids embed the token's object id, which is not guaranteed header-safe.
    let echoed = match HeaderValue::from_str(&session.id) {
        Ok(value) => value,
        Err(_) => {
            if is_new {
                state.sessions.terminate(&session.id);
            }
            return Err(ApiError::Internal(
                "session id is not a valid header value".to_string(),
            ));
        }
    };

    info!(
        user_id = %identity.object_id(),
        session_id = %session.id,
        is_new,
        "MCP session request"
    );

    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static(SESSION_HEADER), echoed.clone());
    headers.insert(HeaderName::from_static(SESSION_HEADER_ALIAS), echoed);
    Ok(response)
}
