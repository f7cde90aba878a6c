//! MCP (Model Context Protocol) tool-call routing.
//!
//! The gateway can front several MCP tool servers at once: local subprocesses
//! speaking JSON-RPC over stdio, and remote servers speaking Streamable HTTP.
//! [`ToolRouter`] fans a listing out across all of them and routes a call to
//! the server that owns the named tool. A server that is down degrades to an
//! empty listing instead of failing the whole request.

mod http;
mod router;
mod stdio;

pub use http::HttpMcpClient;
pub use router::{ListedTool, ToolRouter};
pub use stdio::StdioMcpClient;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC protocol version MCP servers expect.
pub(crate) const JSONRPC_VERSION: &str = "2.0";
/// MCP protocol revision sent during initialization.
pub(crate) const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// One tool as advertised by an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments, passed through verbatim.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
}

/// How to reach one MCP tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum ToolTransport {
    /// Spawn a subprocess and speak JSON-RPC over its stdio.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// POST JSON-RPC to a Streamable HTTP endpoint.
    Http { url: String },
}

/// Configuration for one MCP tool server entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Unique name, used for routing and in listings.
    pub name: String,
    /// Tool names this server claims to serve. Calls for a claimed name route
    /// here directly, without a discovery fanout.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(flatten)]
    pub transport: ToolTransport,
}

/// Errors from talking to MCP servers.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn MCP server '{0}': {1}")]
    Spawn(String, String),

    #[error("MCP transport error: {0}")]
    Transport(String),

    #[error("Malformed MCP response: {0}")]
    Protocol(String),

    #[error("MCP server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("MCP request timed out")]
    Timeout,

    #[error("No server exposes tool '{0}'")]
    UnknownTool(String),
}

/// One MCP server the router can talk to.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Advertised tools, via `tools/list`.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    /// Invoke one tool via `tools/call`; the result is the server's `result`
    /// object, passed through verbatim.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError>;
}

/// Standard JSON-RPC response envelope shared by both transports.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    /// Unwrap the `result`, mapping a JSON-RPC error object to [`McpError`].
    pub(crate) fn into_result(self) -> Result<serde_json::Value, McpError> {
        if let Some(err) = self.error {
            return Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| McpError::Protocol("response has neither result nor error".to_string()))
    }
}

/// Parse the `result` of a `tools/list` call.
pub(crate) fn parse_tool_list(result: serde_json::Value) -> Result<Vec<ToolDescriptor>, McpError> {
    #[derive(Deserialize)]
    struct ToolList {
        #[serde(default)]
        tools: Vec<ToolDescriptor>,
    }

    let list: ToolList = serde_json::from_value(result)
        .map_err(|e| McpError::Protocol(format!("bad tools/list result: {e}")))?;
    Ok(list.tools)
}
