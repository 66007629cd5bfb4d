//! Session state and the per-turn phase machine.

use super::entities::{HistoryEntry, TranscriptMessage};
use crate::core::model::ModelId;
use serde::Serialize;

/// Phase of the turn currently in flight
///
/// `Idle → Sending → Streaming → (Extracting → Generating → Reconciling)? → Idle`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Extracting,
    Generating,
    Reconciling,
}

impl TurnPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, TurnPhase::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Sending => "sending",
            TurnPhase::Streaming => "streaming",
            TurnPhase::Extracting => "extracting",
            TurnPhase::Generating => "generating",
            TurnPhase::Reconciling => "reconciling",
        }
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The conversation as shown to the user and as sent to the model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub transcript: Vec<TranscriptMessage>,
    pub history: Vec<HistoryEntry>,
    pub current_model: ModelId,
}

impl SessionState {
    pub fn new(current_model: ModelId) -> Self {
        Self {
            transcript: Vec::new(),
            history: Vec::new(),
            current_model,
        }
    }

    /// Empty transcript and history, keeping the model selection.
    pub fn clear_conversation(&mut self) {
        self.transcript.clear();
        self.history.clear();
    }

    /// End every pending generation, e.g. after a turn was abandoned.
    /// Returns the number of messages that were still generating.
    pub fn settle_generating(&mut self) -> usize {
        let mut settled = 0;
        for message in self.transcript.iter_mut().filter(|m| m.is_generating) {
            message.finish_generation();
            settled += 1;
        }
        settled
    }
}
