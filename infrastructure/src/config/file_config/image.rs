//! Image backend configuration from TOML (`[image]` section)

use super::{ConfigIssue, Severity};
use cud_domain::{ImagePreset, PresetTable, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw image backend configuration from TOML
///
/// # Example
///
/// ```toml
/// [image]
/// api_host = "localhost:8188"
/// steps = 30
///
/// [image.presets.selfie]
/// width = 576
/// height = 832
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileImageConfig {
    /// `host:port` of the ComfyUI server
    pub api_host: String,
    /// Checkpoint loaded for every job
    pub checkpoint: String,
    pub steps: u32,
    pub cfg: f32,
    pub sampler_name: String,
    pub scheduler: String,
    /// Appended to every negative prompt
    pub negative_suffix: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
    /// Per-preset size overrides, keyed by preset name
    pub presets: BTreeMap<String, FilePresetConfig>,
}

impl Default for FileImageConfig {
    fn default() -> Self {
        Self {
            api_host: "localhost:8188".to_string(),
            checkpoint: "Pony/cyberrealisticPony_v65.safetensors".to_string(),
            steps: 35,
            cfg: 5.0,
            sampler_name: "euler".to_string(),
            scheduler: "normal".to_string(),
            negative_suffix: "Low quality, blurry, bad anatomy".to_string(),
            poll_interval_ms: 500,
            timeout_secs: 300,
            presets: BTreeMap::new(),
        }
    }
}

/// One `[image.presets.<name>]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePresetConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub description: Option<String>,
}

impl FileImageConfig {
    /// Build the preset table, skipping unknown names and zero sizes.
    pub fn preset_table(&self) -> (PresetTable, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut overrides = Vec::new();

        for (name, preset) in &self.presets {
            let field = format!("image.presets.{name}");
            let Ok(resolution) = name.parse::<Resolution>() else {
                issues.push(ConfigIssue::new(
                    Severity::Warning,
                    field,
                    format!(
                        "unknown preset '{name}'; expected one of {}",
                        Resolution::ALL.map(|r| r.as_str()).join(", ")
                    ),
                ));
                continue;
            };
            if preset.width == 0 || preset.height == 0 {
                issues.push(ConfigIssue::new(
                    Severity::Warning,
                    field,
                    "width and height must be non-zero; keeping the built-in size",
                ));
                continue;
            }
            let description = preset
                .description
                .clone()
                .unwrap_or_else(|| format!("{}x{}", preset.width, preset.height));
            overrides.push((
                resolution,
                ImagePreset::new(preset.width, preset.height, description),
            ));
        }

        (PresetTable::with_overrides(overrides), issues)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.preset_table().1;
        if self.steps == 0 {
            issues.push(ConfigIssue::new(
                Severity::Error,
                "image.steps",
                "steps must be at least 1",
            ));
        }
        if self.poll_interval_ms == 0 {
            issues.push(ConfigIssue::new(
                Severity::Warning,
                "image.poll_interval_ms",
                "a zero poll interval busy-loops against the backend",
            ));
        }
        issues
    }
}
