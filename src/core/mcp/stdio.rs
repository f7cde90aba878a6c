//! MCP client over a subprocess's stdio.
//!
//! The server process is spawned per request. Each request performs the full
//! MCP opening sequence (`initialize`, `notifications/initialized`, then the
//! actual call) and scans stdout for the response matching the request id;
//! servers may interleave log lines or notifications, which are skipped.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use super::{
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION, McpClient, McpError, RpcResponse, ToolDescriptor,
    parse_tool_list,
};

const REQUEST_ID: u64 = 2;

pub struct StdioMcpClient {
    name: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Duration,
}

impl StdioMcpClient {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            env,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Spawn(self.name.clone(), e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("child stdout unavailable".to_string()))?;

        let initialize = serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            },
        });
        let initialized = serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": "notifications/initialized",
        });
        let call = serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": REQUEST_ID,
            "method": method,
            "params": params,
        });

        for msg in [&initialize, &initialized, &call] {
            let mut line = msg.to_string();
            line.push('\n');
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| McpError::Transport(format!("write to {}: {e}", self.name)))?;
        }
        stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let scan = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| McpError::Transport(format!("read from {}: {e}", self.name)))?
            {
                let Ok(response) = serde_json::from_str::<RpcResponse>(&line) else {
                    // Log noise or a notification; keep scanning.
                    continue;
                };
                if response.id == Some(serde_json::json!(REQUEST_ID)) {
                    return response.into_result();
                }
            }
            Err(McpError::Protocol(format!(
                "{} exited without answering {method}",
                self.name
            )))
        };

        let result = tokio::time::timeout(self.timeout, scan)
            .await
            .map_err(|_| McpError::Timeout)?;

        // One-shot process; its work is done either way.
        let _ = child.kill().await;
        result
    }
}

#[async_trait]
impl McpClient for StdioMcpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let result = self
            .request("tools/list", serde_json::json!({}))
            .await?;
        parse_tool_list(result)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        self.request(
            "tools/call",
            serde_json::json!({ "name": name, "arguments": arguments }),
        )
        .await
    }
}
