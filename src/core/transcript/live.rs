//! Typed decode of Gemini Live (Vertex AI BidiGenerateContent) server events
//! and the observer that feeds them into the transcript reconciler.
//!
//! Only the documented event subset relevant to transcription is decoded;
//! everything else maps to a single explicit [`LiveEvent::Ignored`] case.
//! Vertex emits both camelCase and snake_case field names depending on the
//! transport path, so every field carries an alias.

use serde::Deserialize;

use super::{TranscriptReconciler, Turn, TurnRole};

/// Placeholder text the client sends solely to elicit an initial greeting.
/// Filtered here, at the boundary, never inside the reconciler.
const GREETING_TRIGGER: &str = "。";

/// Transcript-relevant events extracted from one upstream server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    SetupComplete,
    /// User speech transcription segment. Vertex delivers these as complete
    /// segments, not deltas.
    UserTranscription { text: String },
    /// Assistant speech transcription fragment, streamed incrementally.
    AssistantTranscription { text: String, finished: bool },
    /// Inline text from a model turn part (text-modality responses).
    ModelTurnText { text: String },
    TurnComplete,
    Interrupted,
    /// Anything the schema above does not cover.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ServerMessage {
    #[serde(rename = "setupComplete", alias = "setup_complete")]
    setup_complete: Option<serde_json::Value>,
    #[serde(rename = "serverContent", alias = "server_content")]
    server_content: Option<ServerContent>,
}

#[derive(Debug, Deserialize)]
struct ServerContent {
    #[serde(rename = "inputTranscription", alias = "input_transcription")]
    input_transcription: Option<Transcription>,
    #[serde(rename = "outputTranscription", alias = "output_transcription")]
    output_transcription: Option<Transcription>,
    #[serde(rename = "turnComplete", alias = "turn_complete", default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
    #[serde(rename = "modelTurn", alias = "model_turn")]
    model_turn: Option<ModelTurn>,
}

#[derive(Debug, Deserialize)]
struct Transcription {
    text: Option<String>,
    #[serde(default)]
    finished: bool,
}

#[derive(Debug, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<ModelTurnPart>,
}

#[derive(Debug, Deserialize)]
struct ModelTurnPart {
    text: Option<String>,
    // inlineData (audio) is relayed as-is and carries no transcript content.
}

/// Decode one upstream text frame into its transcript-relevant events.
///
/// A single frame can carry several pieces (e.g. a model turn alongside an
/// output transcription). Frames that are not JSON, or JSON the schema does
/// not cover, yield a single [`LiveEvent::Ignored`].
pub fn decode_live_events(raw: &str) -> Vec<LiveEvent> {
    let msg: ServerMessage = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(_) => return vec![LiveEvent::Ignored],
    };

    let mut events = Vec::new();

    if msg.setup_complete.is_some() {
        events.push(LiveEvent::SetupComplete);
    }

    if let Some(sc) = msg.server_content {
        if let Some(t) = sc.input_transcription
            && let Some(text) = t.text
        {
            events.push(LiveEvent::UserTranscription { text });
        }
        if let Some(t) = sc.output_transcription
            && let Some(text) = t.text
        {
            events.push(LiveEvent::AssistantTranscription {
                text,
                finished: t.finished,
            });
        }
        if let Some(mt) = sc.model_turn {
            for part in mt.parts {
                if let Some(text) = part.text {
                    events.push(LiveEvent::ModelTurnText { text });
                }
            }
        }
        if sc.interrupted {
            events.push(LiveEvent::Interrupted);
        }
        if sc.turn_complete {
            events.push(LiveEvent::TurnComplete);
        }
    }

    if events.is_empty() {
        events.push(LiveEvent::Ignored);
    }
    events
}

/// Taps upstream frames of one bridge session and maintains the reconciled
/// transcript. Frames pass through the relay untouched; this only observes.
#[derive(Debug, Default)]
pub struct LiveTranscriptObserver {
    reconciler: TranscriptReconciler,
    user_seq: u64,
    assistant_seq: u64,
    /// Turn id of the assistant response currently streaming, if any.
    current_assistant: Option<String>,
}

impl LiveTranscriptObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one upstream text frame.
    pub fn observe_text(&mut self, raw: &str) {
        for event in decode_live_events(raw) {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::UserTranscription { text } => {
                let text = text.trim();
                if text.is_empty() || text == GREETING_TRIGGER {
                    return;
                }
                let id = format!("user-{}", self.user_seq);
                self.user_seq += 1;
                self.reconciler
                    .apply_final(&id, TurnRole::User, Some(text));
            }
            LiveEvent::AssistantTranscription { text, finished } => {
                let id = self.assistant_turn_id();
                self.reconciler
                    .apply_delta(&id, TurnRole::Assistant, &text);
                if finished {
                    self.finish_assistant_turn();
                }
            }
            LiveEvent::ModelTurnText { text } => {
                let id = self.assistant_turn_id();
                self.reconciler
                    .apply_delta(&id, TurnRole::Assistant, &text);
            }
            // An interruption finalizes with whatever text accumulated;
            // partial transcripts beat discarded ones on a live display path.
            LiveEvent::TurnComplete | LiveEvent::Interrupted => {
                self.finish_assistant_turn();
            }
            LiveEvent::SetupComplete | LiveEvent::Ignored => {}
        }
    }

    /// Ordered transcript reconstructed so far.
    pub fn turns(&self) -> &[Turn] {
        self.reconciler.turns()
    }

    /// Consume the observer, yielding the final ordered transcript.
    pub fn into_turns(self) -> Vec<Turn> {
        self.reconciler.into_turns()
    }

    fn assistant_turn_id(&mut self) -> String {
        match &self.current_assistant {
            Some(id) => id.clone(),
            None => {
                let id = format!("assistant-{}", self.assistant_seq);
                self.assistant_seq += 1;
                self.current_assistant = Some(id.clone());
                id
            }
        }
    }

    fn finish_assistant_turn(&mut self) {
        if let Some(id) = self.current_assistant.take() {
            self.reconciler.apply_final(&id, TurnRole::Assistant, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::TurnState;

    #[test]
    fn decodes_camel_and_snake_case() {
        let camel = r#"{"serverContent":{"inputTranscription":{"text":"hi"}}}"#;
        let snake = r#"{"server_content":{"input_transcription":{"text":"hi"}}}"#;
        for raw in [camel, snake] {
            assert_eq!(
                decode_live_events(raw),
                vec![LiveEvent::UserTranscription {
                    text: "hi".to_string()
                }]
            );
        }
    }

    #[test]
    fn unknown_payload_is_single_ignored_event() {
        assert_eq!(decode_live_events("not json"), vec![LiveEvent::Ignored]);
        assert_eq!(
            decode_live_events(r#"{"usageMetadata":{"totalTokenCount":12}}"#),
            vec![LiveEvent::Ignored]
        );
    }

    #[test]
    fn one_frame_can_carry_multiple_events() {
        let raw = r#"{"serverContent":{"outputTranscription":{"text":"wor","finished":false},"turnComplete":true}}"#;
        let events = decode_live_events(raw);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LiveEvent::AssistantTranscription { .. }));
        assert_eq!(events[1], LiveEvent::TurnComplete);
    }

    #[test]
    fn observer_streams_assistant_then_finalizes_on_turn_complete() {
        let mut obs = LiveTranscriptObserver::new();
        obs.observe_text(r#"{"serverContent":{"outputTranscription":{"text":"Hel"}}}"#);
        obs.observe_text(r#"{"serverContent":{"outputTranscription":{"text":"lo"}}}"#);

        assert_eq!(obs.turns().len(), 1);
        assert_eq!(obs.turns()[0].text, "Hello");
        assert_eq!(obs.turns()[0].state, TurnState::Streaming);

        obs.observe_text(r#"{"serverContent":{"turnComplete":true}}"#);
        assert_eq!(obs.turns()[0].state, TurnState::Final);

        // A new response gets a fresh turn.
        obs.observe_text(r#"{"serverContent":{"outputTranscription":{"text":"Next"}}}"#);
        assert_eq!(obs.turns().len(), 2);
        assert_eq!(obs.turns()[1].text, "Next");
    }

    #[test]
    fn observer_emits_user_turn_per_segment() {
        let mut obs = LiveTranscriptObserver::new();
        obs.observe_text(r#"{"serverContent":{"inputTranscription":{"text":"first"}}}"#);
        obs.observe_text(r#"{"serverContent":{"inputTranscription":{"text":"second"}}}"#);

        assert_eq!(obs.turns().len(), 2);
        assert!(obs.turns().iter().all(|t| t.role == TurnRole::User));
        assert!(obs.turns().iter().all(|t| t.is_final()));
    }

    #[test]
    fn greeting_trigger_is_filtered_at_boundary() {
        let mut obs = LiveTranscriptObserver::new();
        obs.observe_text(r#"{"serverContent":{"inputTranscription":{"text":"。"}}}"#);
        assert!(obs.turns().is_empty());
    }

    #[test]
    fn interruption_keeps_partial_text() {
        let mut obs = LiveTranscriptObserver::new();
        obs.observe_text(r#"{"serverContent":{"outputTranscription":{"text":"partial answ"}}}"#);
        obs.observe_text(r#"{"serverContent":{"interrupted":true}}"#);

        assert_eq!(obs.turns().len(), 1);
        assert_eq!(obs.turns()[0].text, "partial answ");
        assert!(obs.turns()[0].is_final());
    }
}
