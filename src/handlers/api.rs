//! REST handlers: health check and MCP tool listing/invocation.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// `GET /api/health`
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/mcp/tools`
///
/// Aggregated tool listing across all configured MCP servers. Servers that
/// are unreachable contribute an empty listing rather than failing the call.
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let tools = state.tools.list_tools().await;
    Json(serde_json::json!({
        "success": true,
        "tools": tools,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallToolRequest {
    /// Target server name; omitted means route by tool name discovery.
    pub server: Option<String>,
    pub tool: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// `POST /api/mcp/tools/call`
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CallToolRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if request.tool.is_empty() {
        return Err(AppError::BadRequest("tool must not be empty".to_string()));
    }

    let arguments = match request.arguments {
        serde_json::Value::Null => serde_json::json!({}),
        args @ serde_json::Value::Object(_) => args,
        _ => {
            return Err(AppError::BadRequest(
                "arguments must be a JSON object".to_string(),
            ));
        }
    };

    let result = state
        .tools
        .call_tool(request.server.as_deref(), &request.tool, arguments)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "result": result,
    })))
}
