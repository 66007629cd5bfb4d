//! Conversation session domain.
//!
//! - [`entities::TranscriptMessage`] / [`entities::HistoryEntry`] — user-facing and model-facing records
//! - [`state::SessionState`] / [`state::TurnPhase`] — the conversation and the turn state machine
//! - [`snapshot::PersistedSnapshot`] — bounded, handle-free form for durable storage
//! - [`stream::StreamDecoder`] — newline-delimited streaming response decoder

pub mod entities;
pub mod snapshot;
pub mod state;
pub mod stream;
