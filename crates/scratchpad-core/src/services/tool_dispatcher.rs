//! JSON-RPC tool dispatcher
//!
//! Serves `initialize`, `ping`, `tools/list` and `tools/call` for the scratchpad
//! tools `append`, `get` and `clear`. Notifications are accepted and never answered.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::domain::{RpcError, RpcRequest, RpcResponse, ScopeContext, ScratchpadScope};
use crate::error::ToolError;
use crate::repositories::ScratchpadRepository;
use crate::services::ScratchpadService;

pub const SERVER_NAME: &str = "mcp-scratchpad";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct AppendArgs {
    text: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct ScopeArgs {
    scope: String,
}

pub struct ToolDispatcher<R: ScratchpadRepository> {
    scratchpad: Arc<ScratchpadService<R>>,
}

impl<R: ScratchpadRepository> ToolDispatcher<R> {
    pub fn new(scratchpad: Arc<ScratchpadService<R>>) -> Self {
        Self { scratchpad }
    }

    pub fn release_session(&self, ctx: &ScopeContext) {
        self.scratchpad.release_session(ctx);
    }

    pub async fn dispatch(&self, ctx: &ScopeContext, request: RpcRequest) -> Option<RpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, session_id = %ctx.session_id, "Notification received");
            return None;
        };

        let result = match request.method.as_str() {
            "initialize" => Ok(initialize_result(&request.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(ctx, request.params).await,
            other => Err(RpcError::method_not_found(other)),
        };

        Some(RpcResponse::from_result(id, result))
    }

    async fn call_tool(&self, ctx: &ScopeContext, params: Value) -> Result<Value, RpcError> {
        let call: ToolCall = serde_json::from_value(params)
            .map_err(|e| RpcError::invalid_params(format!("Invalid tool call: {e}")))?;

        let outcome = match call.name.as_str() {
            "append" => {
                let args: AppendArgs = parse_args(call.arguments)?;
                match args.scope.parse::<ScratchpadScope>() {
                    Ok(scope) => self.scratchpad.append(ctx, scope, &args.text).await,
                    Err(e) => Err(e),
                }
            }
            "get" => {
                let args: ScopeArgs = parse_args(call.arguments)?;
                match args.scope.parse::<ScratchpadScope>() {
                    Ok(scope) => self.scratchpad.get(ctx, scope).await,
                    Err(e) => Err(e),
                }
            }
            "clear" => {
                let args: ScopeArgs = parse_args(call.arguments)?;
                match args.scope.parse::<ScratchpadScope>() {
                    Ok(scope) => self.scratchpad.clear(ctx, scope).await,
                    Err(e) => Err(e),
                }
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        match outcome {
            Ok(text) => Ok(json!({ "content": [{ "type": "text", "text": text }] })),
            Err(e) => {
                error!(tool = %call.name, error = %e, "Tool call failed");
                Err(tool_error_to_rpc(&call.name, e))
            }
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, RpcError> {
    serde_json::from_value(arguments)
        .map_err(|e| RpcError::invalid_params(ToolError::InvalidArguments(e.to_string()).to_string()))
}

fn tool_error_to_rpc(tool: &str, err: ToolError) -> RpcError {
    let verb = match tool {
        "append" => "append",
        "get" => "get content",
        "clear" => "clear",
        _ => return RpcError::invalid_params(err.to_string()),
    };
    let message = format!("Failed to {verb}: {err}");
    match err {
        ToolError::Storage(_) => RpcError::internal(message),
        _ => RpcError::invalid_params(message),
    }
}

fn initialize_result(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

fn scope_property(description: &str) -> Value {
    json!({
        "type": "string",
        "enum": ScratchpadScope::ALL.iter().map(ScratchpadScope::as_str).collect::<Vec<_>>(),
        "description": description,
    })
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "append",
            "description": "Append text to a scoped scratchpad buffer",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to append to the buffer" },
                    "scope": scope_property(
                        "Storage scope: session (current session only), user (all sessions for this user), or global (shared across all users)"
                    ),
                },
                "required": ["text", "scope"]
            }
        },
        {
            "name": "get",
            "description": "Get the complete content of a scoped scratchpad buffer",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "scope": scope_property("Storage scope to retrieve: session, user, or global"),
                },
                "required": ["scope"]
            }
        },
        {
            "name": "clear",
            "description": "Clear the content of a scoped scratchpad buffer",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "scope": scope_property("Storage scope to clear: session, user, or global"),
                },
                "required": ["scope"]
            }
        }
    ])
}
