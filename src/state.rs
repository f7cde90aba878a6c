//! Shared application state.

use std::sync::Arc;

use crate::auth::TokenSource;
use crate::config::ServerConfig;
use crate::core::bridge::{BridgeConfig, TungsteniteConnector, UpstreamConnector};
use crate::core::mcp::ToolRouter;

/// State shared by every handler, built once at startup.
pub struct AppState {
    pub config: ServerConfig,
    pub tools: Arc<ToolRouter>,
    pub tokens: Arc<dyn TokenSource>,
    pub connector: Arc<dyn UpstreamConnector>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let tools = Arc::new(ToolRouter::from_configs(&config.tool_servers));
        let tokens = config.token_source()?;
        Ok(Self {
            config,
            tools,
            tokens,
            connector: Arc::new(TungsteniteConnector),
        })
    }

    /// Per-session bridge settings derived from the server configuration.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            setup_timeout: self.config.setup_timeout,
        }
    }
}
