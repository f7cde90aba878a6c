//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and MCP tool endpoints
//! - `bridge` - Live audio bridge WebSocket

pub mod api;
pub mod bridge;

pub use bridge::live_bridge_handler;
