//! Domain layer for cud-chat
//!
//! Pure conversation logic with no I/O: the entities a chat session is made
//! of and the transforms applied to model output.
//!
//! # Core Concepts
//!
//! ## Turns
//!
//! A turn is one user submission and the assistant's streamed reply. The
//! reply arrives as newline-delimited JSON and is reassembled by
//! [`StreamDecoder`]. Turn progress is tracked by [`TurnPhase`].
//!
//! ## Directives
//!
//! An assistant reply may embed a `[GENERATE_IMAGE]{...}` directive asking
//! for an image. [`extract_directive`] turns it into a validated
//! [`GenerationDirective`].
//!
//! ## Adapters
//!
//! LoRA adapters selected for image generation are held in an immutable
//! [`AdapterSelection`]; [`ActiveAdapters`] keeps one job from applying the
//! same adapter twice.

pub mod adapter;
pub mod core;
pub mod directive;
pub mod image;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use adapter::{
    active::ActiveAdapters,
    selection::{AdapterId, AdapterOptions, AdapterSelection, AdapterSnapshot, SelectedAdapter},
};
pub use core::{error::DomainError, model::ModelId, user_input::UserInput};
pub use directive::{
    DIRECTIVE_MARKER, DirectiveError, GenerationDirective, contains_directive, extract_directive,
};
pub use image::{
    binary::{BinaryImage, ResourceHandle},
    preset::{ImagePreset, PresetTable, Resolution},
};
pub use session::{
    entities::{HistoryEntry, MessageKind, Role, Speaker, TranscriptMessage},
    snapshot::{
        MAX_PERSISTED_ENTRIES, PartialSessionState, PersistedSnapshot, SNAPSHOT_VERSION,
        VersionedRecord,
    },
    state::{SessionState, TurnPhase},
    stream::{FeedOutcome, LineError, StreamDecoder},
};
