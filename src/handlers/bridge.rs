//! Live audio bridge WebSocket handler.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tracing::info;

use crate::core::bridge::{AxumWebSocketTransport, BridgeSession};
use crate::state::AppState;

/// Maximum WebSocket frame size (10 MB); audio file uploads arrive base64
/// encoded inside a single text frame.
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// `GET /ws/live`
///
/// Upgrades the connection and relays it to the upstream realtime provider
/// named in the client's setup message.
pub async fn live_bridge_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Live bridge WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_live_socket(socket, state))
}

async fn handle_live_socket(socket: WebSocket, state: Arc<AppState>) {
    let session = BridgeSession::new(
        AxumWebSocketTransport::new(socket),
        state.connector.clone(),
        state.tokens.clone(),
        state.bridge_config(),
    );
    let turns = session.run().await;

    // The transcript is rebuilt server-side per session; for now its only
    // consumer is the session log.
    for turn in &turns {
        tracing::debug!(id = %turn.id, role = ?turn.role, text = %turn.text, "Session turn");
    }
}
