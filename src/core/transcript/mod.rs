//! Streaming transcript reconciliation.
//!
//! Realtime speech providers emit fine-grained text deltas for low-latency UI
//! feedback, but individual delta events may be reordered or dropped under
//! network jitter. This module reconstructs a stable, deduplicated sequence of
//! conversation turns from that stream: deltas extend an in-progress turn in
//! place, the provider's final transcript is authoritative over accumulated
//! deltas, and a history snapshot can backfill turns the live stream missed
//! without ever overwriting live state.
//!
//! The reconciler is pure and synchronous. Callers on a multi-threaded runtime
//! must serialize access themselves (each bridge session owns its own instance).

pub mod live;

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// Lifecycle state of a turn. Transitions `Streaming -> Final` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Streaming,
    Final,
}

/// One logical utterance or response from a single speaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Stable opaque identifier, assigned on the turn's first event.
    pub id: String,
    pub role: TurnRole,
    /// Accumulated text. Monotonically non-decreasing in length while
    /// streaming; replaced wholesale by an authoritative final transcript.
    pub text: String,
    pub state: TurnState,
    /// Timestamp of the first event observed for this turn.
    #[serde(skip, default = "SystemTime::now")]
    pub created_at: SystemTime,
}

impl Turn {
    pub fn is_final(&self) -> bool {
        self.state == TurnState::Final
    }
}

/// Reconciles an unordered-arrival stream of transcript events into an
/// ordered, render-ready list of [`Turn`]s.
///
/// Turns appear in the order their first event was observed; later events for
/// a known turn update it in place. Anomalous events (a delta or second final
/// for an already-final turn) are logged and absorbed rather than surfaced:
/// this feeds a live display path where availability beats strictness.
#[derive(Debug, Default)]
pub struct TranscriptReconciler {
    turns: Vec<Turn>,
    /// turn id -> index into `turns`
    index: HashMap<String, usize>,
}

impl TranscriptReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an incremental text fragment for a turn.
    ///
    /// Creates the turn in `Streaming` state if this is its first event,
    /// appending it to the visible sequence; otherwise extends the existing
    /// text without changing its position. Empty fragments are ignored.
    /// A delta for an already-final turn is a logged no-op.
    pub fn apply_delta(&mut self, turn_id: &str, role: TurnRole, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        match self.index.get(turn_id) {
            Some(&i) => {
                let turn = &mut self.turns[i];
                if turn.is_final() {
                    tracing::warn!(
                        turn_id,
                        "Ignoring delta for already-finalized turn"
                    );
                    return;
                }
                turn.text.push_str(fragment);
            }
            None => self.push_turn(turn_id, role, fragment.to_string(), TurnState::Streaming),
        }
    }

    /// Finalize a turn.
    ///
    /// When `full_text` is provided it replaces the accumulated text: the
    /// provider's own final transcript is authoritative, since client-side
    /// delta reassembly can drift under packet reordering. If no turn with
    /// this id exists (final arrived without preceding deltas, the common case
    /// for non-streaming events), a new final turn is appended directly.
    /// Idempotent: a second final for an already-final turn is a logged no-op.
    pub fn apply_final(&mut self, turn_id: &str, role: TurnRole, full_text: Option<&str>) {
        match self.index.get(turn_id) {
            Some(&i) => {
                let turn = &mut self.turns[i];
                if turn.is_final() {
                    tracing::debug!(turn_id, "Duplicate finalization ignored");
                    return;
                }
                if let Some(text) = full_text {
                    turn.text = text.to_string();
                }
                turn.state = TurnState::Final;
            }
            None => {
                let text = full_text.unwrap_or_default().to_string();
                if text.is_empty() {
                    tracing::warn!(turn_id, "Final event for unknown turn with no text");
                    return;
                }
                self.push_turn(turn_id, role, text, TurnState::Final);
            }
        }
    }

    /// Merge an authoritative turn list from upstream history.
    ///
    /// The snapshot is a lower-priority fallback used only to recover turns
    /// the delta/final stream missed (e.g. dropped events): turns absent
    /// locally are appended, existing local turns are left untouched.
    pub fn reconcile_from_snapshot(&mut self, snapshot: impl IntoIterator<Item = Turn>) {
        for turn in snapshot {
            if self.index.contains_key(&turn.id) {
                continue;
            }
            tracing::debug!(turn_id = %turn.id, "Recovered turn from history snapshot");
            let i = self.turns.len();
            self.index.insert(turn.id.clone(), i);
            self.turns.push(turn);
        }
    }

    /// Ordered view of all turns, first-seen order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Consume the reconciler, yielding the ordered turns.
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push_turn(&mut self, turn_id: &str, role: TurnRole, text: String, state: TurnState) {
        let i = self.turns.len();
        self.index.insert(turn_id.to_string(), i);
        self.turns.push(Turn {
            id: turn_id.to_string(),
            role,
            text,
            state,
            created_at: SystemTime::now(),
        });
    }
}
