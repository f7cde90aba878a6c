//! Fanout listing and name-based routing across configured MCP servers.

use futures::future::join_all;
use serde::Serialize;

use super::{
    HttpMcpClient, McpClient, McpError, StdioMcpClient, ToolDescriptor, ToolServerConfig,
    ToolTransport,
};

/// A tool listing entry, annotated with the server that owns it.
#[derive(Debug, Clone, Serialize)]
pub struct ListedTool {
    pub server: String,
    #[serde(flatten)]
    pub tool: ToolDescriptor,
}

struct ToolServer {
    name: String,
    /// Tool names the config claims for this server; consulted before any
    /// discovery fanout.
    claims: Vec<String>,
    client: Box<dyn McpClient>,
}

/// Routes tool listings and calls across all configured MCP servers.
pub struct ToolRouter {
    servers: Vec<ToolServer>,
}

impl ToolRouter {
    /// Build clients for every configured server. No connections are made
    /// here; each request opens its own.
    pub fn from_configs(configs: &[ToolServerConfig]) -> Self {
        let servers = configs
            .iter()
            .map(|cfg| {
                let client: Box<dyn McpClient> = match &cfg.transport {
                    ToolTransport::Stdio { command, args, env } => Box::new(StdioMcpClient::new(
                        cfg.name.clone(),
                        command.clone(),
                        args.clone(),
                        env.clone(),
                    )),
                    ToolTransport::Http { url } => Box::new(HttpMcpClient::new(url.clone())),
                };
                ToolServer {
                    name: cfg.name.clone(),
                    claims: cfg.tools.clone(),
                    client,
                }
            })
            .collect();
        Self { servers }
    }

    #[cfg(test)]
    fn from_clients(clients: Vec<(String, Vec<String>, Box<dyn McpClient>)>) -> Self {
        Self {
            servers: clients
                .into_iter()
                .map(|(name, claims, client)| ToolServer {
                    name,
                    claims,
                    client,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// List tools from every server concurrently. A server that fails
    /// contributes nothing instead of failing the aggregate.
    pub async fn list_tools(&self) -> Vec<ListedTool> {
        let listings = join_all(self.servers.iter().map(|server| async {
            match server.client.list_tools().await {
                Ok(tools) => tools
                    .into_iter()
                    .map(|tool| ListedTool {
                        server: server.name.clone(),
                        tool,
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!(server = %server.name, error = %e, "Tool listing failed");
                    Vec::new()
                }
            }
        }))
        .await;
        listings.into_iter().flatten().collect()
    }

    /// Invoke a tool. With `server` given, route directly; otherwise prefer a
    /// server whose configured claims list the name, and only then fall back
    /// to discovering which server advertises it.
    pub async fn call_tool(
        &self,
        server: Option<&str>,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let target = match server {
            Some(name) => self
                .servers
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| McpError::UnknownTool(format!("{name}/{tool}")))?,
            None => match self
                .servers
                .iter()
                .find(|s| s.claims.iter().any(|claim| claim == tool))
            {
                Some(claimant) => claimant,
                None => {
                    let listed = self.list_tools().await;
                    let owner = listed
                        .iter()
                        .find(|entry| entry.tool.name == tool)
                        .map(|entry| entry.server.clone())
                        .ok_or_else(|| McpError::UnknownTool(tool.to_string()))?;
                    self.servers
                        .iter()
                        .find(|s| s.name == owner)
                        .ok_or_else(|| McpError::UnknownTool(tool.to_string()))?
                }
            },
        };

        tracing::debug!(server = %target.name, tool, "Routing tool call");
        target.client.call_tool(tool, arguments).await
    }
}
