//! Live bridge WebSocket route configuration
//!
//! # Endpoint
//!
//! `GET /ws/live` - WebSocket upgrade for the realtime audio bridge
//!
//! # Protocol
//!
//! After the upgrade, the first client frame must be a JSON setup message:
//!
//! ```json
//! {"service_url": "wss://...", "bearer_token": "optional"}
//! ```
//!
//! Everything after that is relayed to the named upstream byte-for-byte,
//! except `audio_file` control messages, which the server expands into
//! chunked realtime audio input.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::bridge::live_bridge_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live bridge WebSocket router
pub fn create_bridge_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/live", get(live_bridge_handler))
        .layer(TraceLayer::new_for_http())
}
