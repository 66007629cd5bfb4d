//! Durable state store port
//!
//! Saves and restores the bounded session snapshot. Every operation is
//! infallible at the port boundary: a store that cannot write degrades to
//! memory-only operation and reports through logging, and a store that
//! cannot read returns whatever it could decode.

use cud_domain::{PartialSessionState, PersistedSnapshot};
use std::sync::Mutex;

pub trait StateStore: Send + Sync {
    /// Write `snapshot`, replacing any previous records.
    fn save(&self, snapshot: &PersistedSnapshot);

    /// Read back whatever records exist; never fails.
    fn load(&self) -> PartialSessionState;

    /// Remove every stored record.
    fn clear(&self);
}

/// Process-lifetime store for tests and memory-only operation
#[derive(Default)]
pub struct MemoryStateStore {
    snapshot: Mutex<Option<PersistedSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently saved snapshot, if any
    pub fn saved(&self) -> Option<PersistedSnapshot> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<PersistedSnapshot>> {
        self.snapshot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, snapshot: &PersistedSnapshot) {
        *self.slot() = Some(snapshot.clone());
    }

    fn load(&self) -> PartialSessionState {
        self.slot()
            .clone()
            .map(PartialSessionState::from)
            .unwrap_or_default()
    }

    fn clear(&self) {
        *self.slot() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cud_domain::{ModelId, SessionState, TranscriptMessage};

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        assert!(store.load().is_empty());

        let mut state = SessionState::new(ModelId::Aureial);
        state.transcript.push(TranscriptMessage::user_text("hi"));
        store.save(&PersistedSnapshot::capture(&state, 100));

        let restored = store.load().into_session_state(ModelId::default());
        assert_eq!(restored, state);

        store.clear();
        assert!(store.load().is_empty());
    }
}
