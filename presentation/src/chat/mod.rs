//! Interactive chat module
//!
//! Provides a readline-based interactive chat interface with slash
//! commands for models, adapters and direct image generation.

pub mod command;
mod repl;

pub use command::ReplCommand;
pub use repl::ChatRepl;
