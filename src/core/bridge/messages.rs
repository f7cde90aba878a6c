//! Wire messages the bridge itself interprets.
//!
//! Only two things are parsed out of the byte stream: the client's first
//! (setup) frame, and the proxy-local `audio_file` control message that gets
//! expanded into chunked realtime input. Everything else is relayed opaque.

use base64::prelude::*;
use serde::Deserialize;

use super::{BridgeError, Frame};

/// First downstream frame of every session.
///
/// `service_url` is required; a missing `bearer_token` triggers server-side
/// credential acquisition.
#[derive(Debug, Clone, Deserialize)]
pub struct SetupMessage {
    pub service_url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl SetupMessage {
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        let setup: SetupMessage = serde_json::from_str(raw)
            .map_err(|e| BridgeError::InvalidSetup(e.to_string()))?;
        if setup.service_url.is_empty() {
            return Err(BridgeError::InvalidSetup(
                "service_url must not be empty".to_string(),
            ));
        }
        Ok(setup)
    }
}

/// Proxy-local control messages a client may send after setup.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientControlMessage {
    /// A complete audio file to transcribe as one user turn. The bridge
    /// decodes, resamples, and chunks it server-side.
    #[serde(rename = "audio_file")]
    AudioFile {
        /// Base64-encoded audio: a WAV container, or raw PCM16 mono at the
        /// target rate when `mime_type` says `audio/pcm`.
        data: String,
        #[serde(default)]
        mime_type: Option<String>,
    },
}

impl ClientControlMessage {
    /// Try to parse a text frame as a control message. Frames that are not
    /// control messages belong to the opaque relay path.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn decode_audio(data: &str) -> Result<Vec<u8>, BridgeError> {
        BASE64_STANDARD
            .decode(data)
            .map_err(|e| BridgeError::BadAudioPayload(format!("invalid base64: {e}")))
    }
}

/// Build a Gemini Live realtime-input frame carrying one PCM16 chunk.
pub fn media_chunk_frame(pcm: &[u8], sample_rate: u32) -> Frame {
    let payload = serde_json::json!({
        "realtime_input": {
            "media_chunks": [{
                "mime_type": format!("audio/pcm;rate={sample_rate}"),
                "data": BASE64_STANDARD.encode(pcm),
            }]
        }
    });
    Frame::Text(payload.to_string())
}

/// Build the commit marker terminating a batch of audio chunks.
pub fn audio_stream_end_frame() -> Frame {
    let payload = serde_json::json!({
        "realtime_input": { "audio_stream_end": true }
    });
    Frame::Text(payload.to_string())
}
