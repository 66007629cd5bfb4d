//! Turn progress notification port
//!
//! Lets the presentation layer follow a turn as it streams, switches to
//! image generation, and settles. Every callback has a no-op default.

use cud_domain::{DirectiveError, GenerationDirective, ResourceHandle, TurnPhase};

pub trait TurnProgressNotifier: Send + Sync {
    /// The turn entered `phase`.
    fn on_phase(&self, _phase: TurnPhase) {}

    /// New assistant text arrived.
    fn on_stream_chunk(&self, _text: &str) {}

    /// The finished response asked for an image.
    fn on_directive(&self, _directive: &GenerationDirective) {}

    /// The response carried a directive marker that could not be used.
    fn on_directive_rejected(&self, _error: &DirectiveError) {}

    /// Coarse generation progress, 0..=100.
    fn on_generation_progress(&self, _percent: u8) {}

    /// A generated image was added to the transcript.
    fn on_image(&self, _handle: &ResourceHandle) {}

    /// The turn surfaced a user-visible error.
    fn on_error(&self, _message: &str) {}
}

/// No-op notifier for when progress reporting is not needed
pub struct NoTurnProgress;

impl TurnProgressNotifier for NoTurnProgress {}
