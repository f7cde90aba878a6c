//! MCP client over Streamable HTTP.
//!
//! Every JSON-RPC message is POSTed to the server's single MCP endpoint. The
//! server answers with either a plain JSON body or a short SSE stream whose
//! `data:` lines carry the JSON-RPC responses; both shapes are handled. Each
//! request runs its own initialize handshake and forwards the session id the
//! server may hand back.

use std::time::Duration;

use async_trait::async_trait;

use super::{
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION, McpClient, McpError, RpcResponse, ToolDescriptor,
    parse_tool_list,
};

const SESSION_HEADER: &str = "mcp-session-id";
const REQUEST_ID: u64 = 2;

pub struct HttpMcpClient {
    url: String,
    client: reqwest::Client,
}

impl HttpMcpClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        session: Option<&str>,
    ) -> Result<reqwest::Response, McpError> {
        let mut req = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(body);
        if let Some(session) = session {
            req = req.header(SESSION_HEADER, session);
        }
        req.send()
            .await
            .map_err(|e| McpError::Transport(format!("POST {}: {e}", self.url)))
    }

    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
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
        let response = self.post(&initialize, None).await?;
        if !response.status().is_success() {
            return Err(McpError::Transport(format!(
                "initialize returned {}",
                response.status()
            )));
        }
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let initialized = serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": "notifications/initialized",
        });
        // Servers answer notifications with 202/204; the body is irrelevant.
        let _ = self.post(&initialized, session.as_deref()).await?;

        let call = serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": REQUEST_ID,
            "method": method,
            "params": params,
        });
        let response = self.post(&call, session.as_deref()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(McpError::Transport(format!("{method} returned {status}")));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let rpc = if content_type.starts_with("text/event-stream") {
            parse_sse_response(&body)?
        } else {
            serde_json::from_str::<RpcResponse>(&body)
                .map_err(|e| McpError::Protocol(format!("bad JSON-RPC body: {e}")))?
        };
        rpc.into_result()
    }
}

/// Pull the JSON-RPC response for our request id out of an SSE body.
fn parse_sse_response(body: &str) -> Result<RpcResponse, McpError> {
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let Ok(rpc) = serde_json::from_str::<RpcResponse>(data.trim()) else {
            continue;
        };
        if rpc.id == Some(serde_json::json!(REQUEST_ID)) {
            return Ok(rpc);
        }
    }
    Err(McpError::Protocol(
        "event stream ended without a response".to_string(),
    ))
}

#[async_trait]
impl McpClient for HttpMcpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let result = self.request("tools/list", serde_json::json!({})).await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_handshake(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(serde_json::json!({"method": "initialize"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "sess-1")
                    .set_body_json(serde_json::json!({
                        "jsonrpc": "2.0", "id": 1,
                        "result": {"protocolVersion": "2025-03-26"},
                    })),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(
                serde_json::json!({"method": "notifications/initialized"}),
            ))
            .respond_with(ResponseTemplate::new(202))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lists_tools_from_json_body() {
        let server = MockServer::start().await;
        mock_handshake(&server).await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(serde_json::json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 2,
                "result": {"tools": [{"name": "search", "description": "Web search"}]},
            })))
            .mount(&server)
            .await;

        let client = HttpMcpClient::new(format!("{}/mcp", server.uri()));
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search");
    }

    #[tokio::test]
    async fn parses_sse_bodies() {
        let server = MockServer::start().await;
        mock_handshake(&server).await;
        let sse = concat!(
            "event: message\n",
            r#"data: {"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"sse_tool"}]}}"#,
            "\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(serde_json::json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let client = HttpMcpClient::new(format!("{}/mcp", server.uri()));
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools[0].name, "sse_tool");
    }

    #[tokio::test]
    async fn forwards_session_id_on_tool_calls() {
        let server = MockServer::start().await;
        mock_handshake(&server).await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(serde_json::json!({"method": "tools/call"})))
            .and(wiremock::matchers::header("mcp-session-id", "sess-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 2,
                "result": {"content": [{"type": "text", "text": "42"}]},
            })))
            .mount(&server)
            .await;

        let client = HttpMcpClient::new(format!("{}/mcp", server.uri()));
        let result = client
            .call_tool("answer", serde_json::json!({"q": "life"}))
            .await
            .unwrap();
        assert_eq!(result["content"][0]["text"], "42");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let client = HttpMcpClient::new("http://127.0.0.1:1/mcp");
        assert!(matches!(
            client.list_tools().await.unwrap_err(),
            McpError::Transport(_)
        ));
    }
}
