//! Configuration file loading for cud-chat
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `CUD_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./cud.toml` or `./.cud.toml`
//! 4. Global: `$XDG_CONFIG_HOME/cud-chat/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, FileChatConfig, FileConfig, FileImageConfig, FileLoggingConfig,
    FilePresetConfig, FileReplConfig, FileStorageConfig, Severity,
};
pub use loader::ConfigLoader;
