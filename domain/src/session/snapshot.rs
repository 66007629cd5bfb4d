//! Shaping of session state for durable storage.
//!
//! Persisted records are bounded to the most recent entries, carry a
//! format version, and never contain process-lifetime data (image handles,
//! generation flags, system-role history).

use super::entities::{HistoryEntry, TranscriptMessage};
use super::state::SessionState;
use crate::core::model::ModelId;
use serde::{Deserialize, Serialize};

/// Maximum entries kept per persisted list; oldest entries are evicted first
pub const MAX_PERSISTED_ENTRIES: usize = 100;

/// Current on-disk record format
pub const SNAPSHOT_VERSION: u32 = 1;

/// A stored record tagged with the format version it was written with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord<T> {
    pub version: u32,
    pub data: T,
}

impl<T> VersionedRecord<T> {
    pub fn current(data: T) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            data,
        }
    }

    pub fn is_current(&self) -> bool {
        self.version == SNAPSHOT_VERSION
    }
}

/// The three independently stored records of a session
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSnapshot {
    pub messages: Vec<TranscriptMessage>,
    pub history: Vec<HistoryEntry>,
    pub current_model: ModelId,
}

impl PersistedSnapshot {
    /// Capture `state`, keeping at most `max_entries` of each list.
    pub fn capture(state: &SessionState, max_entries: usize) -> Self {
        let messages = tail(&state.transcript, max_entries)
            .iter()
            .map(TranscriptMessage::to_persisted)
            .collect();
        let history: Vec<HistoryEntry> = state
            .history
            .iter()
            .filter(|entry| !entry.is_system())
            .cloned()
            .collect();

        Self {
            messages,
            history: tail(&history, max_entries).to_vec(),
            current_model: state.current_model.clone(),
        }
    }
}

/// Whatever could be restored from storage; absent records are `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSessionState {
    pub messages: Option<Vec<TranscriptMessage>>,
    pub history: Option<Vec<HistoryEntry>>,
    pub current_model: Option<ModelId>,
}

impl PartialSessionState {
    pub fn is_empty(&self) -> bool {
        self.messages.is_none() && self.history.is_none() && self.current_model.is_none()
    }

    /// Build a full session state, using `fallback_model` when no model
    /// selection was stored.
    pub fn into_session_state(self, fallback_model: ModelId) -> SessionState {
        let mut state = SessionState {
            transcript: self.messages.unwrap_or_default(),
            history: self
                .history
                .unwrap_or_default()
                .into_iter()
                .filter(|entry| !entry.is_system())
                .collect(),
            current_model: self.current_model.unwrap_or(fallback_model),
        };
        state.settle_generating();
        state
    }
}

impl From<PersistedSnapshot> for PartialSessionState {
    fn from(snapshot: PersistedSnapshot) -> Self {
        Self {
            messages: Some(snapshot.messages),
            history: Some(snapshot.history),
            current_model: Some(snapshot.current_model),
        }
    }
}

fn tail<T>(items: &[T], max: usize) -> &[T] {
    &items[items.len().saturating_sub(max)..]
}
