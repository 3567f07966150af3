use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use scratchpad_shared::constants::{SESSION_HEADER, SESSION_HEADER_ALIAS};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::error::ApiError;
use crate::handlers::{health, mcp, well_known};
use crate::middleware::{bind_session, require_identity};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/healthz", get(health::health_check))
        .route(
            well_known::RESOURCE_METADATA_PATH,
            get(well_known::protected_resource_metadata),
        );

    // Protected routes: identity first, then session binding for POST only
    let protected_routes = Router::new()
        .route(
            "/mcp",
            post(mcp::handle_rpc)
                .layer(from_fn_with_state(state.clone(), bind_session))
                .delete(mcp::end_session),
        )
        .route_layer(from_fn_with_state(state.clone(), require_identity));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let session_headers = [
        HeaderName::from_static(SESSION_HEADER),
        HeaderName::from_static(SESSION_HEADER_ALIAS),
    ];

    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            session_headers[0].clone(),
            session_headers[1].clone(),
        ])
        .expose_headers(session_headers)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::well_known::ResourceMetadata;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use scratchpad_core::clock::SystemClock;
    use scratchpad_core::repositories::InMemoryScratchpadRepository;
    use scratchpad_core::services::{ScratchpadService, SessionStore, ToolChannelFactory, ToolDispatcher};
    use scratchpad_security::testutil::*;
    use scratchpad_security::{IdentityVerifier, VerifierConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(enforce_owner: bool) -> AppState {
        let verifier = IdentityVerifier::new(
            VerifierConfig {
                issuer: TEST_ISSUER.to_string(),
                audience: TEST_AUDIENCE.to_string(),
                allowed_scopes: vec![TEST_SCOPE.to_string()],
                leeway_secs: 0,
                key_cache_max_entries: 5,
                key_cache_max_age: Duration::from_secs(600),
            },
            Arc::new(StaticKeySource::default()),
        );

        let repo = Arc::new(InMemoryScratchpadRepository::new());
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(ScratchpadService::new(repo))));
        let sessions = Arc::new(SessionStore::new(
            Arc::new(ToolChannelFactory::new(dispatcher)),
            Arc::new(SystemClock),
            enforce_owner,
        ));

        AppState::new(
            Arc::new(verifier),
            sessions,
            ResourceMetadata {
                resource_id: TEST_AUDIENCE.to_string(),
                issuer: TEST_ISSUER.to_string(),
                scopes_supported: vec![TEST_SCOPE.to_string()],
                authorization_endpoint: "https://issuer.test/authorize".to_string(),
                token_endpoint: "https://issuer.test/token".to_string(),
                jwks_uri: "https://issuer.test/keys".to_string(),
                resource_metadata_uri: format!(
                    "http://localhost:3000{}",
                    well_known::RESOURCE_METADATA_PATH
                ),
            },
        )
    }

    fn rpc_request(token: Option<&str>, session_id: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(id) = session_id {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn delete_request(token: &str, header: Option<(&str, &str)>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::DELETE)
            .uri("/mcp")
            .header(AUTHORIZATION, format!("Bearer {token}"));
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn ping(id: i64) -> Value {
        json!({ "jsonrpc": "2.0", "id": id, "method": "ping" })
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_header(response: &Response<Body>) -> String {
        response
            .headers()
            .get(SESSION_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_missing_authorization_is_401() {
        let state = test_state(true);
        let app = build_router(state.clone());

        let response = app.oneshot(rpc_request(None, None, ping(1))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(response).await;
        assert_eq!(body["error"], "Authorization header missing or invalid");
        assert_eq!(body["details"], "Expected: Bearer <token>");
        assert_eq!(body["reason"], "missing_header");
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_token_never_touches_sessions() {
        let state = test_state(true);
        let app = build_router(state.clone());
        let token = TokenBuilder::new().signed_by(OTHER_RSA_PRIVATE_PEM).sign();

        let response = app
            .oneshot(rpc_request(Some(token.as_str()), Some("chosen"), ping(1)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Authentication failed");
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_audience_is_401() {
        let app = build_router(test_state(true));
        let token = TokenBuilder::new().claim("aud", "api://elsewhere").sign();

        let response = app.oneshot(rpc_request(Some(token.as_str()), None, ping(1))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid audience");
        assert_eq!(body["details"], format!("Expected: {TEST_AUDIENCE}"));
    }

    #[tokio::test]
    async fn test_missing_identifiers_is_401() {
        let app = build_router(test_state(true));
        let token = TokenBuilder::new().without("oid").sign();

        let response = app.oneshot(rpc_request(Some(token.as_str()), None, ping(1))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid token claims");
        assert_eq!(body["details"], "Missing required user identifiers");
    }

    #[tokio::test]
    async fn test_insufficient_scope_is_403() {
        let app = build_router(test_state(true));
        let token = TokenBuilder::new().scopes("User.Read Mail.Send").sign();

        let response = app.oneshot(rpc_request(Some(token.as_str()), None, ping(1))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = json_body(response).await;
        assert_eq!(body["error"], "Insufficient permissions");
        assert_eq!(body["details"], format!("Required scopes: {TEST_SCOPE}"));
        assert_eq!(body["provided"], json!(["User.Read", "Mail.Send"]));
    }

    #[tokio::test]
    async fn test_new_session_assigned_then_resumed() {
        let state = test_state(true);
        let app = build_router(state.clone());
        let token = TokenBuilder::new().sign();

        let first = app
            .clone()
            .oneshot(rpc_request(Some(token.as_str()), None, ping(1)))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let session_id = session_header(&first);
        assert!(session_id.starts_with("owner-1-"));
        assert_eq!(
            first.headers().get(SESSION_HEADER_ALIAS).unwrap(),
            session_id.as_str()
        );
        let created = state.sessions.lookup(&session_id).unwrap();
        assert_eq!(created.owner_object_id, "owner-1");

        let second = app
            .oneshot(rpc_request(Some(token.as_str()), Some(session_id.as_str()), ping(2)))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(session_header(&second), session_id);

        let resumed = state.sessions.lookup(&session_id).unwrap();
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(resumed.created_at, created.created_at);
        assert!(resumed.last_activity_at >= created.last_activity_at);
    }

    #[tokio::test]
    async fn test_tool_calls_within_session() {
        let app = build_router(test_state(true));
        let token = TokenBuilder::new().sign();

        let append = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "append", "arguments": { "text": "note", "scope": "session" } }
        });
        let response = app
            .clone()
            .oneshot(rpc_request(Some(token.as_str()), Some("tool-session"), append))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let get = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "get", "arguments": { "scope": "session" } }
        });
        let response = app
            .oneshot(rpc_request(Some(token.as_str()), Some("tool-session"), get))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["id"], 2);
        assert_eq!(body["result"]["content"][0]["text"], "note");
    }

    #[tokio::test]
    async fn test_notification_is_accepted() {
        let app = build_router(test_state(true));
        let token = TokenBuilder::new().sign();
        let notification = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });

        let response = app
            .oneshot(rpc_request(Some(token.as_str()), None, notification))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let app = build_router(test_state(true));
        let token = TokenBuilder::new().sign();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid JSON-RPC request");
    }

    #[tokio::test]
    async fn test_foreign_session_rejected_when_enforced() {
        let state = test_state(true);
        let app = build_router(state.clone());
        let owner = TokenBuilder::new().sign();
        let intruder = TokenBuilder::new().owner("owner-2").sign();

        app.clone()
            .oneshot(rpc_request(Some(owner.as_str()), Some("private"), ping(1)))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(rpc_request(Some(intruder.as_str()), Some("private"), ping(2)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["reason"], "session_owner_mismatch");

        let response = app
            .oneshot(delete_request(&intruder, Some((SESSION_HEADER, "private"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(state.sessions.lookup("private").is_some());
    }

    #[tokio::test]
    async fn test_foreign_session_trusted_when_not_enforced() {
        let app = build_router(test_state(false));
        let owner = TokenBuilder::new().sign();
        let other = TokenBuilder::new().owner("owner-2").sign();

        app.clone()
            .oneshot(rpc_request(Some(owner.as_str()), Some("shared"), ping(1)))
            .await
            .unwrap();
        let response = app
            .oneshot(rpc_request(Some(other.as_str()), Some("shared"), ping(2)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let state = test_state(true);
        let app = build_router(state.clone());
        let token = TokenBuilder::new().sign();

        let response = app.clone().oneshot(delete_request(&token, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(delete_request(&token, Some((SESSION_HEADER_ALIAS, "unknown"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Session not found");

        let created = app
            .clone()
            .oneshot(rpc_request(Some(token.as_str()), None, ping(1)))
            .await
            .unwrap();
        let session_id = session_header(&created);

        let response = app
            .oneshot(delete_request(&token, Some((SESSION_HEADER_ALIAS, session_id.as_str()))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "Session ended successfully" })
        );
        assert!(state.sessions.lookup(&session_id).is_none());
    }

    fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    #[tokio::test]
    async fn test_ended_session_id_reused_by_other_user_starts_empty() {
        let state = test_state(true);
        let app = build_router(state.clone());
        let alice = TokenBuilder::new().sign();
        let mallory = TokenBuilder::new().owner("owner-2").sign();

        let response = app
            .clone()
            .oneshot(rpc_request(
                Some(alice.as_str()),
                Some("s-x"),
                tool_call(1, "append", json!({ "text": "alice-secret", "scope": "session" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(delete_request(&alice, Some((SESSION_HEADER, "s-x"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(rpc_request(
                Some(mallory.as_str()),
                Some("s-x"),
                tool_call(2, "get", json!({ "scope": "session" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["result"]["content"][0]["text"],
            "No content in session scratchpad."
        );
        assert_eq!(
            state.sessions.lookup("s-x").unwrap().owner_object_id,
            "owner-2"
        );
    }

    #[tokio::test]
    async fn test_unreadable_session_header_is_400() {
        let state = test_state(true);
        let app = build_router(state.clone());
        let token = TokenBuilder::new().sign();

        let mut request = rpc_request(Some(token.as_str()), None, ping(1));
        request.headers_mut().insert(
            SESSION_HEADER,
            axum::http::HeaderValue::from_bytes(b"s-\xe9t\xe9").unwrap(),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid session id");
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_public_endpoints() {
        let app = build_router(test_state(true));

        let health = app
            .clone()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        let body = json_body(health).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
        assert!(body["timestamp"].is_string());

        let metadata = app
            .clone()
            .oneshot(
                Request::get(well_known::RESOURCE_METADATA_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(metadata.status(), StatusCode::OK);
        let body = json_body(metadata).await;
        assert_eq!(body["resource_id"], TEST_AUDIENCE);
        assert_eq!(body["issuer"], TEST_ISSUER);
        assert_eq!(body["scopes_supported"], json!([TEST_SCOPE]));
        assert_eq!(body["jwks_uri"], "https://issuer.test/keys");

        let missing = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(missing).await, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn test_cors_preflight_mirrors_origin() {
        let app = build_router(test_state(true));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/mcp")
            .header("origin", "https://client.test")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "authorization,mcp-session-id")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://client.test"
        );
        assert_eq!(
            response.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );
    }
}
