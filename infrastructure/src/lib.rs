//! Infrastructure layer for cud-chat
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the streaming chat endpoint, the ComfyUI
//! image backend, file-backed storage, and configuration file loading.

pub mod chat;
pub mod config;
pub mod image;
pub mod logging;
pub mod storage;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use chat::{DEFAULT_SYSTEM_PROMPT, OllamaChatGateway};
pub use config::{
    ConfigIssue, ConfigLoader, FileChatConfig, FileConfig, FileImageConfig, FileLoggingConfig,
    FileReplConfig, FileStorageConfig, Severity,
};
pub use image::{ComfyUiImageGenerator, ComfyUiSettings};
pub use logging::JsonlConversationLogger;
pub use storage::{FileHandleBackend, FileStateStore};
