//! Chat endpoint adapters.

pub mod ollama;

pub use ollama::{DEFAULT_SYSTEM_PROMPT, OllamaChatGateway};
