//! Realtime audio bridge.
//!
//! A duplex relay between a downstream (browser) WebSocket and an upstream
//! provider WebSocket (Vertex AI Gemini Live). The bridge resolves a bearer
//! credential from the client's setup message or an injected [`TokenSource`],
//! opens the upstream socket with it, and then forwards frames byte-for-byte
//! in both directions. Frames the client sends while the upstream connection
//! is still being established are queued, never dropped.
//!
//! [`TokenSource`]: crate::auth::TokenSource

mod messages;
mod session;
mod transport;

pub use messages::{SetupMessage, audio_stream_end_frame, media_chunk_frame};
pub use session::{BridgeConfig, BridgeSession};
pub use transport::{
    AxumWebSocketTransport, CloseReason, Frame, FrameTransport, TungsteniteConnector,
    UpstreamConnector,
};

use thiserror::Error;

/// WebSocket close codes used by the bridge.
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Policy violation: malformed or missing setup, setup timeout.
    pub const PROTOCOL_ERROR: u16 = 1008;
    /// Credential acquisition failed.
    pub const AUTH_FAILED: u16 = 4401;
    /// Upstream connection failed or errored mid-session.
    pub const UPSTREAM_FAILED: u16 = 4502;
}

/// Errors that terminate a bridge session.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Timed out waiting for setup message")]
    SetupTimeout,

    #[error("Invalid setup message: {0}")]
    InvalidSetup(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Upstream connection failed: {0}")]
    UpstreamConnectFailed(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Unusable audio payload: {0}")]
    BadAudioPayload(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Close code reported to the downstream client for this failure.
    pub fn close_code(&self) -> u16 {
        match self {
            BridgeError::SetupTimeout | BridgeError::InvalidSetup(_) => close_code::PROTOCOL_ERROR,
            BridgeError::AuthenticationFailed(_) => close_code::AUTH_FAILED,
            BridgeError::UpstreamConnectFailed(_) | BridgeError::UpstreamError(_) => {
                close_code::UPSTREAM_FAILED
            }
            BridgeError::BadAudioPayload(_) => close_code::PROTOCOL_ERROR,
            BridgeError::Transport(_) => close_code::NORMAL,
        }
    }
}
