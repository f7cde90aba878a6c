//! Per-session relay state machine.
//!
//! One [`BridgeSession`] owns exactly one downstream and (once established)
//! one upstream transport; nothing is shared between sessions. Lifecycle:
//! await the setup frame (bounded by a timeout), resolve the credential, open
//! the upstream socket while queueing downstream frames FIFO, flush, then
//! relay bidirectionally until either side closes or errors. Either side
//! closing tears the other down with the same code, best-effort, through a
//! single teardown path.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::auth::TokenSource;
use crate::core::audio::{self, TARGET_RATE_GEMINI};
use crate::core::transcript::Turn;
use crate::core::transcript::live::LiveTranscriptObserver;

use super::messages::{
    ClientControlMessage, SetupMessage, audio_stream_end_frame, media_chunk_frame,
};
use super::transport::{CloseReason, Frame, FrameTransport, UpstreamConnector};
use super::{BridgeError, close_code};

/// Tunables for one bridge session.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How long to wait for the client's setup frame.
    pub setup_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            setup_timeout: Duration::from_secs(10),
        }
    }
}

/// One duplex relay between a downstream client and an upstream provider.
pub struct BridgeSession<D: FrameTransport> {
    id: String,
    downstream: D,
    connector: Arc<dyn UpstreamConnector>,
    tokens: Arc<dyn TokenSource>,
    config: BridgeConfig,
    observer: LiveTranscriptObserver,
}

impl<D: FrameTransport> BridgeSession<D> {
    pub fn new(
        downstream: D,
        connector: Arc<dyn UpstreamConnector>,
        tokens: Arc<dyn TokenSource>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            downstream,
            connector,
            tokens,
            config,
            observer: LiveTranscriptObserver::new(),
        }
    }

    /// Drive the session to completion. Returns the transcript reconstructed
    /// from observed upstream events.
    pub async fn run(mut self) -> Vec<Turn> {
        tracing::info!(session_id = %self.id, "Bridge session started");

        if let Err(e) = self.run_inner().await {
            tracing::warn!(
                session_id = %self.id,
                error = %e,
                code = e.close_code(),
                "Bridge session failed"
            );
            self.downstream
                .close(Some(CloseReason::new(e.close_code(), e.to_string())))
                .await;
        }

        let turns = self.observer.into_turns();
        tracing::info!(session_id = %self.id, turns = turns.len(), "Bridge session ended");
        turns
    }

    async fn run_inner(&mut self) -> Result<(), BridgeError> {
        // AwaitingSetup
        let first = timeout(self.config.setup_timeout, self.downstream.next())
            .await
            .map_err(|_| BridgeError::SetupTimeout)?;
        let raw = match first {
            Some(Ok(Frame::Text(text))) => text,
            Some(Ok(Frame::Close(_))) | None => return Ok(()),
            Some(Ok(Frame::Binary(_))) => {
                return Err(BridgeError::InvalidSetup(
                    "setup must be a JSON text frame".to_string(),
                ));
            }
            Some(Err(e)) => return Err(e),
        };
        let setup = SetupMessage::parse(&raw)?;
        tracing::debug!(session_id = %self.id, service_url = %setup.service_url, "Setup received");

        // AcquiringCredential
        let token = match setup.bearer_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => self
                .tokens
                .fetch()
                .await
                .map_err(|e| BridgeError::AuthenticationFailed(e.to_string()))?,
        };

        // ConnectingUpstream: frames arriving now are queued, never dropped.
        let connector = Arc::clone(&self.connector);
        let connect = connector.connect(&setup.service_url, &token);
        tokio::pin!(connect);

        let mut pending: VecDeque<Frame> = VecDeque::new();
        let mut upstream = loop {
            tokio::select! {
                res = &mut connect => break res?,
                msg = self.downstream.next() => match msg {
                    Some(Ok(Frame::Close(_))) | None => {
                        tracing::info!(session_id = %self.id, "Client left before upstream was ready");
                        return Ok(());
                    }
                    Some(Ok(frame)) => pending.extend(expand_outbound(frame)),
                    Some(Err(e)) => return Err(e),
                },
            }
        };

        // Relaying: flush the queue in arrival order, then forward duplex.
        if !pending.is_empty() {
            tracing::debug!(session_id = %self.id, frames = pending.len(), "Flushing queued frames");
        }
        for frame in pending.drain(..) {
            upstream.send(frame).await?;
        }

        loop {
            tokio::select! {
                msg = self.downstream.next() => match msg {
                    Some(Ok(Frame::Close(reason))) => {
                        upstream.close(reason).await;
                        return Ok(());
                    }
                    Some(Ok(frame)) => {
                        for out in expand_outbound(frame) {
                            upstream.send(out).await?;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(session_id = %self.id, error = %e, "Downstream transport error");
                        upstream.close(None).await;
                        return Ok(());
                    }
                    None => {
                        upstream.close(None).await;
                        return Ok(());
                    }
                },
                msg = upstream.next() => match msg {
                    Some(Ok(Frame::Close(reason))) => {
                        self.downstream.close(reason).await;
                        return Ok(());
                    }
                    Some(Ok(frame)) => {
                        if let Frame::Text(text) = &frame {
                            self.observer.observe_text(text);
                        }
                        if self.downstream.send(frame).await.is_err() {
                            // Downstream already gone; inbound frames are
                            // dropped from here on.
                            upstream.close(None).await;
                            return Ok(());
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        self.downstream
                            .close(Some(CloseReason::new(close_code::NORMAL, "upstream closed")))
                            .await;
                        return Ok(());
                    }
                },
            }
        }
    }
}

/// Map one downstream frame to the frames actually sent upstream.
///
/// `audio_file` control messages expand into chunked realtime input plus the
/// stream-end commit marker; unusable audio payloads are logged and dropped;
/// everything else passes through untouched.
fn expand_outbound(frame: Frame) -> Vec<Frame> {
    let Frame::Text(text) = &frame else {
        return vec![frame];
    };
    let Some(ClientControlMessage::AudioFile { data, mime_type }) =
        ClientControlMessage::parse(text)
    else {
        return vec![frame];
    };

    match expand_audio_file(&data, mime_type.as_deref()) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unusable audio_file message");
            Vec::new()
        }
    }
}

fn expand_audio_file(data: &str, mime_type: Option<&str>) -> Result<Vec<Frame>, BridgeError> {
    let bytes = ClientControlMessage::decode_audio(data)?;

    let pcm_frames = if mime_type.is_some_and(|m| m.starts_with("audio/pcm")) {
        // Already PCM16 at the target rate; only chunking needed.
        audio::chunk_pcm16(&bytes, audio::chunk_bytes_for_rate(TARGET_RATE_GEMINI))
    } else {
        audio::wav_to_pcm_frames(Cursor::new(bytes), TARGET_RATE_GEMINI)
            .map_err(|e| BridgeError::BadAudioPayload(e.to_string()))?
    };

    let mut out: Vec<Frame> = pcm_frames
        .iter()
        .map(|f| media_chunk_frame(&f.data, TARGET_RATE_GEMINI))
        .collect();
    if pcm_frames.last().is_some_and(|f| f.commit) {
        out.push(audio_stream_end_frame());
    }
    Ok(out)
}
