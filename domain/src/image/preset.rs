//! Resolution presets for image generation.
//!
//! A directive may only name one of the five fixed [`Resolution`] presets.
//! The pixel size behind each preset is configuration ([`PresetTable`]),
//! not engine logic; the defaults below mirror the sizes the backend
//! checkpoint was tuned for.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the fixed resolution presets a directive may request
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Selfie,
    Profile,
    #[default]
    Landscape,
    Square,
    Portrait,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [
        Resolution::Selfie,
        Resolution::Profile,
        Resolution::Landscape,
        Resolution::Square,
        Resolution::Portrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Selfie => "selfie",
            Resolution::Profile => "profile",
            Resolution::Landscape => "landscape",
            Resolution::Square => "square",
            Resolution::Portrait => "portrait",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resolution {
    type Err = DomainError;

    /// Exact, case-sensitive match against the preset names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::InvalidResolution(s.to_string()))
    }
}

/// Pixel size and human-readable description of a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePreset {
    pub width: u32,
    pub height: u32,
    pub description: String,
}

impl ImagePreset {
    pub fn new(width: u32, height: u32, description: impl Into<String>) -> Self {
        Self {
            width,
            height,
            description: description.into(),
        }
    }
}

/// Mapping from every [`Resolution`] to its [`ImagePreset`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetTable {
    presets: BTreeMap<Resolution, ImagePreset>,
}

impl PresetTable {
    /// Build a table from configured presets, falling back to the default
    /// for any preset that is not configured.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (Resolution, ImagePreset)>) -> Self {
        let mut table = Self::default();
        for (resolution, preset) in overrides {
            table.presets.insert(resolution, preset);
        }
        table
    }

    pub fn get(&self, resolution: Resolution) -> &ImagePreset {
        // Every constructor fills all five presets
        &self.presets[&resolution]
    }

    pub fn dimensions(&self, resolution: Resolution) -> (u32, u32) {
        let preset = self.get(resolution);
        (preset.width, preset.height)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resolution, &ImagePreset)> {
        self.presets.iter().map(|(r, p)| (*r, p))
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        let presets = BTreeMap::from([
            (
                Resolution::Selfie,
                ImagePreset::new(
                    512,
                    768,
                    "Vertical orientation optimized for close-up shots (512x768)",
                ),
            ),
            (
                Resolution::Profile,
                ImagePreset::new(768, 512, "Horizontal orientation good for profile views (768x512)"),
            ),
            (
                Resolution::Landscape,
                ImagePreset::new(1024, 768, "Wide format ideal for landscapes and scenes (1024x768)"),
            ),
            (
                Resolution::Square,
                ImagePreset::new(768, 768, "Perfect square format (768x768)"),
            ),
            (
                Resolution::Portrait,
                ImagePreset::new(768, 1024, "Tall vertical format for full body shots (768x1024)"),
            ),
        ]);
        Self { presets }
    }
}
