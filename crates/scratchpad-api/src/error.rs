use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scratchpad_core::{ChannelError, SessionError};
use scratchpad_security::AuthError;
use thiserror::Error;

use crate::response::ErrorBody;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Session header required")]
    MissingSessionHeader,

    #[error("Invalid session id")]
    InvalidSessionId,

    #[error("Invalid JSON-RPC request: {0}")]
    InvalidRpcRequest(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session {0} belongs to another user")]
    SessionOwnerMismatch(String),

    #[error("MCP request failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ApiError::SessionNotFound,
            SessionError::OwnerMismatch { session_id } => ApiError::SessionOwnerMismatch(session_id),
        }
    }
}

fn auth_response(err: AuthError) -> (StatusCode, ErrorBody) {
    let reason = err.reason();
    let body = match err {
        AuthError::MissingCredentials => {
            ErrorBody::new("Authorization header missing or invalid").details("Expected: Bearer <token>")
        }
        AuthError::MissingClaims => {
            ErrorBody::new("Invalid token claims").details("Missing required user identifiers")
        }
        AuthError::AudienceMismatch { expected } => {
            ErrorBody::new("Invalid audience").details(format!("Expected: {expected}"))
        }
        AuthError::InsufficientScope { required, provided } => {
            tracing::warn!(provided = ?provided, "Forbidden: insufficient scope");
            return (
                StatusCode::FORBIDDEN,
                ErrorBody::new("Insufficient permissions")
                    .details(format!("Required scopes: {}", required.join(", ")))
                    .reason(reason)
                    .provided(provided),
            );
        }
        AuthError::UpstreamUnavailable(_) => {
            ErrorBody::new("Authentication failed").details("Unable to retrieve token signing keys")
        }
        other => ErrorBody::new("Authentication failed").details(other.to_string()),
    };
    tracing::warn!(reason, "Unauthorized");
    (StatusCode::UNAUTHORIZED, body.reason(reason))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Auth(err) => auth_response(err),
            ApiError::MissingSessionHeader => {
                tracing::warn!("Bad request: session header missing");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new("Session header required")
                        .details("Provide Mcp-Session-Id or X-Session-Id"),
                )
            }
            ApiError::InvalidSessionId => {
                tracing::warn!("Bad request: unreadable session header");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new("Invalid session id")
                        .details("Session ids must be visible ASCII"),
                )
            }
            ApiError::InvalidRpcRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new("Invalid JSON-RPC request").details(msg),
                )
            }
            ApiError::SessionNotFound => {
                tracing::warn!("Session not found");
                (StatusCode::NOT_FOUND, ErrorBody::new("Session not found"))
            }
            ApiError::SessionOwnerMismatch(session_id) => {
                tracing::warn!(session_id = %session_id, "Forbidden: session owned by another user");
                (
                    StatusCode::FORBIDDEN,
                    ErrorBody::new("Insufficient permissions")
                        .details("Session belongs to another user")
                        .reason("session_owner_mismatch"),
                )
            }
            ApiError::Channel(err) => {
                tracing::error!("MCP request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("MCP request failed").details(err.to_string()),
                )
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new("Not found")),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
