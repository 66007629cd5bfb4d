//! Persistence configuration from TOML (`[storage]` section)

use super::{ConfigIssue, Severity};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_DIR: &str = "cud-chat";

/// Raw storage configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// Directory for the session records; platform data dir when unset
    pub dir: Option<String>,
    /// Entries kept per persisted list
    pub max_entries: usize,
    /// Quiet period before a save is written
    pub debounce_ms: u64,
    /// Directory for generated image files; platform cache dir when unset
    pub handle_dir: Option<String>,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_entries: cud_domain::MAX_PERSISTED_ENTRIES,
            debounce_ms: 250,
            handle_dir: None,
        }
    }
}

impl FileStorageConfig {
    /// Resolved session record directory
    pub fn state_dir(&self) -> PathBuf {
        resolve(self.dir.as_deref(), dirs::data_dir(), "state")
    }

    /// Resolved image file directory
    pub fn image_dir(&self) -> PathBuf {
        resolve(self.handle_dir.as_deref(), dirs::cache_dir(), "images")
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_entries == 0 {
            issues.push(ConfigIssue::new(
                Severity::Warning,
                "storage.max_entries",
                "max_entries is 0; nothing from the conversation will be kept",
            ));
        }
        issues
    }
}

fn resolve(configured: Option<&str>, platform: Option<PathBuf>, leaf: &str) -> PathBuf {
    match configured {
        Some(dir) => expand_home(dir),
        None => platform
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
            .join(leaf),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dirs_win() {
        let config = FileStorageConfig {
            dir: Some("/var/lib/cud".to_string()),
            handle_dir: Some("/tmp/cud-images".to_string()),
            ..Default::default()
        };
        assert_eq!(config.state_dir(), PathBuf::from("/var/lib/cud"));
        assert_eq!(config.image_dir(), PathBuf::from("/tmp/cud-images"));
    }

    #[test]
    fn test_default_dirs_are_namespaced() {
        let config = FileStorageConfig::default();
        assert!(config.state_dir().ends_with("cud-chat/state"));
        assert!(config.image_dir().ends_with("cud-chat/images"));
    }

    #[test]
    fn test_zero_entries_warns() {
        let config = FileStorageConfig {
            max_entries: 0,
            ..Default::default()
        };
        assert_eq!(config.validate().len(), 1);
    }
}
