//! Presentation-level configuration
//!
//! Configuration for REPL behavior.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// REPL configuration for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Show spinners and streamed text while a turn runs
    pub show_progress: bool,
    /// Path to the line-editor history file
    pub history_file: Option<PathBuf>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            history_file: None,
        }
    }
}

impl ReplConfig {
    /// Configured history file, or the platform data directory default
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("cud-chat").join("history.txt")))
    }
}
