//! Frame transport abstraction over both ends of a bridge session.
//!
//! The session logic is written against [`FrameTransport`] and
//! [`UpstreamConnector`] rather than concrete socket types: the downstream end
//! is an axum server-side WebSocket, the upstream end a tungstenite client
//! socket, and tests drive the session with channel-backed fakes.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use super::BridgeError;

/// Close code and reason carried across the relay on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// One relayed WebSocket frame. Ping/pong is handled below this layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close(Option<CloseReason>),
}

/// A duplex frame endpoint owned by exactly one bridge session.
#[async_trait]
pub trait FrameTransport: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), BridgeError>;

    /// Next inbound frame; `None` once the peer is gone.
    async fn next(&mut self) -> Option<Result<Frame, BridgeError>>;

    /// Best-effort close; never fails.
    async fn close(&mut self, reason: Option<CloseReason>);
}

/// Capability for opening the upstream provider socket with a credential.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(
        &self,
        service_url: &str,
        bearer_token: &str,
    ) -> Result<Box<dyn FrameTransport>, BridgeError>;
}

// =============================================================================
// Downstream: axum server-side WebSocket
// =============================================================================

/// Adapter over the axum WebSocket handed to the upgrade handler.
pub struct AxumWebSocketTransport {
    socket: axum::extract::ws::WebSocket,
}

impl AxumWebSocketTransport {
    pub fn new(socket: axum::extract::ws::WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl FrameTransport for AxumWebSocketTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), BridgeError> {
        use axum::extract::ws::{CloseFrame, Message};

        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
                code: r.code,
                reason: r.reason.into(),
            })),
        };
        self.socket
            .send(msg)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }

    async fn next(&mut self) -> Option<Result<Frame, BridgeError>> {
        use axum::extract::ws::Message;

        loop {
            return match self.socket.recv().await? {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.to_string()))),
                Ok(Message::Binary(data)) => Some(Ok(Frame::Binary(data))),
                Ok(Message::Close(frame)) => Some(Ok(Frame::Close(frame.map(|f| {
                    CloseReason::new(f.code, f.reason.to_string())
                })))),
                // axum answers pings itself; nothing to relay
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => Some(Err(BridgeError::Transport(e.to_string()))),
            };
        }
    }

    async fn close(&mut self, reason: Option<CloseReason>) {
        use axum::extract::ws::{CloseFrame, Message};

        let _ = self
            .socket
            .send(Message::Close(reason.map(|r| CloseFrame {
                code: r.code,
                reason: r.reason.into(),
            })))
            .await;
    }
}

// =============================================================================
// Upstream: tungstenite client WebSocket
// =============================================================================

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Adapter over the upstream provider socket.
pub struct UpstreamSocketTransport {
    socket: WsStream,
}

#[async_trait]
impl FrameTransport for UpstreamSocketTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), BridgeError> {
        use tungstenite::Message;
        use tungstenite::protocol::frame::CloseFrame;
        use tungstenite::protocol::frame::coding::CloseCode;

        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            })),
        };
        self.socket
            .send(msg)
            .await
            .map_err(|e| BridgeError::UpstreamError(e.to_string()))
    }

    async fn next(&mut self) -> Option<Result<Frame, BridgeError>> {
        use tungstenite::Message;

        loop {
            return match self.socket.next().await? {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.to_string()))),
                Ok(Message::Binary(data)) => Some(Ok(Frame::Binary(data))),
                Ok(Message::Close(frame)) => Some(Ok(Frame::Close(frame.map(|f| {
                    CloseReason::new(u16::from(f.code), f.reason.to_string())
                })))),
                // tungstenite queues pongs internally; flushed by the next send
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => Some(Err(BridgeError::UpstreamError(e.to_string()))),
            };
        }
    }

    async fn close(&mut self, reason: Option<CloseReason>) {
        use tungstenite::protocol::frame::CloseFrame;
        use tungstenite::protocol::frame::coding::CloseCode;

        let _ = self
            .socket
            .close(reason.map(|r| CloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            }))
            .await;
    }
}

/// Opens the upstream socket with the resolved credential in an
/// `Authorization` header.
pub struct TungsteniteConnector;

#[async_trait]
impl UpstreamConnector for TungsteniteConnector {
    async fn connect(
        &self,
        service_url: &str,
        bearer_token: &str,
    ) -> Result<Box<dyn FrameTransport>, BridgeError> {
        let url = url::Url::parse(service_url)
            .map_err(|e| BridgeError::InvalidSetup(format!("invalid service_url: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(BridgeError::InvalidSetup(format!(
                "service_url must be ws:// or wss://, got {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| BridgeError::InvalidSetup("service_url has no host".to_string()))?
            .to_string();

        let request = http::Request::builder()
            .uri(service_url)
            .header("Authorization", format!("Bearer {bearer_token}"))
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| BridgeError::UpstreamConnectFailed(e.to_string()))?;

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| BridgeError::UpstreamConnectFailed(e.to_string()))?;

        tracing::info!(url = %service_url, "Connected to upstream provider");
        Ok(Box::new(UpstreamSocketTransport { socket }))
    }
}
