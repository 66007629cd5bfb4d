//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly; parsing into domain types happens in
//! the `parse_*` / `*_table` helpers, which also report what they rejected.

mod chat;
mod image;
mod logging;
mod repl;
mod storage;

pub use chat::FileChatConfig;
pub use image::{FileImageConfig, FilePresetConfig};
pub use logging::FileLoggingConfig;
pub use repl::FileReplConfig;
pub use storage::FileStorageConfig;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found while validating the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted path of the offending field, e.g. `chat.default_model`
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(severity: Severity, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Chat endpoint settings
    pub chat: FileChatConfig,
    /// Image backend settings
    pub image: FileImageConfig,
    /// Session persistence settings
    pub storage: FileStorageConfig,
    /// Conversation log settings
    pub logging: FileLoggingConfig,
    /// REPL settings
    pub repl: FileReplConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.chat.parse_default_model().1);
        issues.extend(self.image.validate());
        issues.extend(self.storage.validate());
        issues
    }
}
