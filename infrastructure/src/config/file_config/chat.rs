//! Chat endpoint configuration from TOML (`[chat]` section)

use super::{ConfigIssue, Severity};
use cud_domain::ModelId;
use serde::{Deserialize, Serialize};

/// Raw chat configuration from TOML
///
/// # Example
///
/// ```toml
/// [chat]
/// api_url = "http://localhost:11434/api/chat"
/// default_model = "Socrates"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChatConfig {
    /// Streaming chat endpoint
    pub api_url: String,
    /// Model used until the user picks another one
    pub default_model: String,
    /// Replaces the built-in directive instructions when set
    pub system_prompt: Option<String>,
    /// Connect timeout for chat requests, in seconds
    pub connect_timeout_secs: u64,
}

impl Default for FileChatConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/api/chat".to_string(),
            default_model: ModelId::default().to_string(),
            system_prompt: None,
            connect_timeout_secs: 10,
        }
    }
}

impl FileChatConfig {
    /// Parse `default_model`, reporting empty or unknown names.
    pub fn parse_default_model(&self) -> (ModelId, Vec<ConfigIssue>) {
        let name = self.default_model.trim();
        if name.is_empty() {
            return (
                ModelId::default(),
                vec![ConfigIssue::new(
                    Severity::Error,
                    "chat.default_model",
                    "model name cannot be empty; using the default model",
                )],
            );
        }

        let Ok(model) = name.parse::<ModelId>();
        let mut issues = Vec::new();
        if model.is_custom() {
            issues.push(ConfigIssue::new(
                Severity::Warning,
                "chat.default_model",
                format!("'{name}' is not a known model; it will be sent to the endpoint as-is"),
            ));
        }
        (model, issues)
    }
}
