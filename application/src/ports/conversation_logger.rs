//! Port for structured conversation logging.
//!
//! [`ConversationLogger`] records what happened in each turn (requests,
//! full responses, detected directives, generation results) as
//! machine-readable records, separately from `tracing` diagnostics.

use serde_json::Value;

/// A structured conversation event.
pub struct ConversationEvent {
    /// Event type identifier (e.g. "chat_request", "image_generated").
    pub event_type: &'static str,
    /// Event-specific fields.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Records conversation events.
///
/// `log` is synchronous and infallible; a logger that fails to write drops
/// the event.
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
