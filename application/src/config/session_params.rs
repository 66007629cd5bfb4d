//! Session parameters — conversation orchestration control.
//!
//! [`SessionParams`] groups the static parameters the
//! [`ConversationOrchestrator`](crate::use_cases::converse::ConversationOrchestrator)
//! and the deferred persistence worker run with.

use cud_domain::{MAX_PERSISTED_ENTRIES, ModelId};
use std::time::Duration;

/// Notice shown in place of a progress message whose generation failed
pub const DEFAULT_FAILURE_NOTICE: &str = "Sorry, I couldn't generate that image.";

/// Conversation orchestration parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    /// Model used when nothing was restored from storage.
    pub default_model: ModelId,
    /// Entries kept per persisted list.
    pub max_persisted_entries: usize,
    /// Quiet period before a scheduled save is written.
    pub persist_debounce: Duration,
    /// Fixed text that replaces a failed generation's status line.
    pub failure_notice: String,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            default_model: ModelId::default(),
            max_persisted_entries: MAX_PERSISTED_ENTRIES,
            persist_debounce: Duration::from_millis(250),
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
        }
    }
}

impl SessionParams {
    // ==================== Builder Methods ====================

    pub fn with_default_model(mut self, model: ModelId) -> Self {
        self.default_model = model;
        self
    }

    pub fn with_max_persisted_entries(mut self, max: usize) -> Self {
        self.max_persisted_entries = max;
        self
    }

    pub fn with_persist_debounce(mut self, debounce: Duration) -> Self {
        self.persist_debounce = debounce;
        self
    }

    pub fn with_failure_notice(mut self, notice: impl Into<String>) -> Self {
        self.failure_notice = notice.into();
        self
    }
}
