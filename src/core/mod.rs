pub mod audio;
pub mod bridge;
pub mod mcp;
pub mod transcript;

// Re-export commonly used types for convenience
pub use bridge::{BridgeConfig, BridgeError, BridgeSession, FrameTransport, UpstreamConnector};

pub use mcp::{McpClient, McpError, ToolDescriptor, ToolRouter, ToolServerConfig};

pub use transcript::{TranscriptReconciler, Turn, TurnRole, TurnState};
