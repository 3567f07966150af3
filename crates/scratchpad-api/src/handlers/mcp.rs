use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use scratchpad_core::{RpcRequest, Session};
use scratchpad_security::Identity;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::middleware::session_id_from_headers;
use crate::response::MessageResponse;
use crate::state::AppState;

/// POST /mcp - forwards one JSON-RPC message to the session's channel.
pub async fn handle_rpc(
    Extension(session): Extension<Session>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: RpcRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidRpcRequest(e.to_string()))?;

    debug!(session_id = %session.id, method = %request.method, "Dispatching MCP request");

    match session.channel().exchange(request).await? {
        Some(reply) => Ok(Json(reply).into_response()),
        None => Ok(StatusCode::ACCEPTED.into_response()),
    }
}

/// DELETE /mcp - ends the session named by the session header.
pub async fn end_session(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let session_id = session_id_from_headers(&headers)?.ok_or(ApiError::MissingSessionHeader)?;

    state.sessions.terminate_for(&session_id, &identity)?;

    info!(
        session_id = %session_id,
        user_id = %identity.object_id(),
        "MCP session ended"
    );
    Ok(Json(MessageResponse::new("Session ended successfully")))
}
