//! Adapter (LoRA) selection with per-adapter options.
//!
//! [`AdapterSelection`] is an immutable value: every operation returns a new
//! selection and leaves the receiver untouched. Options are stored next to
//! their adapter in a single ordered list, so an options entry can never
//! outlive the selection entry it belongs to.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Name of an image-generation adapter as known by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterId(String);

impl AdapterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AdapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AdapterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Tunable parameters of a selected adapter; unset fields use backend defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
}

impl AdapterOptions {
    /// Apply a `key=value` assignment such as `strength=0.8`.
    pub fn with_assignment(mut self, assignment: &str) -> Result<Self, DomainError> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            DomainError::InvalidAdapterOption {
                key: assignment.to_string(),
                reason: "expected key=value".to_string(),
            }
        })?;
        let key = key.trim();
        let parsed: f32 =
            value
                .trim()
                .parse()
                .map_err(|_| DomainError::InvalidAdapterOption {
                    key: key.to_string(),
                    reason: format!("'{}' is not a number", value.trim()),
                })?;

        match key {
            "clip_strength" => self.clip_strength = Some(parsed),
            "strength" => self.strength = Some(parsed),
            "weight" => self.weight = Some(parsed),
            other => {
                return Err(DomainError::InvalidAdapterOption {
                    key: other.to_string(),
                    reason: "expected clip_strength, strength or weight".to_string(),
                });
            }
        }
        Ok(self)
    }
}

/// A selected adapter paired with the options it will be applied with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedAdapter {
    pub id: AdapterId,
    pub options: AdapterOptions,
}

/// Selection and options captured once at the start of a generation job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdapterSnapshot {
    adapters: Vec<SelectedAdapter>,
}

impl AdapterSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &SelectedAdapter> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// The set of selected adapters with their options, in selection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterSelection {
    entries: Vec<SelectedAdapter>,
}

impl AdapterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select an adapter with default options. Already-selected adapters keep
    /// their current options.
    pub fn with_added(&self, id: AdapterId) -> Self {
        if self.contains(&id) {
            return self.clone();
        }
        let mut entries = self.entries.clone();
        entries.push(SelectedAdapter {
            id,
            options: AdapterOptions::default(),
        });
        Self { entries }
    }

    /// Deselect an adapter, dropping its options with it.
    pub fn without(&self, id: &AdapterId) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| &entry.id != id)
                .cloned()
                .collect(),
        }
    }

    pub fn toggled(&self, id: AdapterId) -> Self {
        if self.contains(&id) {
            self.without(&id)
        } else {
            self.with_added(id)
        }
    }

    /// Replace the options of a selected adapter. Unselected adapters are
    /// left unselected; the selection is returned unchanged.
    pub fn with_options(&self, id: &AdapterId, options: AdapterOptions) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|entry| {
                    if &entry.id == id {
                        SelectedAdapter {
                            id: entry.id.clone(),
                            options,
                        }
                    } else {
                        entry.clone()
                    }
                })
                .collect(),
        }
    }

    pub fn contains(&self, id: &AdapterId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    pub fn ids(&self) -> Vec<AdapterId> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }

    pub fn options_for(&self, id: &AdapterId) -> Option<AdapterOptions> {
        self.entries
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| entry.options)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> AdapterSnapshot {
        AdapterSnapshot {
            adapters: self.entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AdapterId {
        AdapterId::new(s)
    }

    #[test]
    fn test_add_then_remove_leaves_no_residue() {
        let selection = AdapterSelection::new().with_added(id("film-grain"));
        assert!(selection.contains(&id("film-grain")));
        assert_eq!(
            selection.options_for(&id("film-grain")),
            Some(AdapterOptions::default())
        );

        let selection = selection.without(&id("film-grain"));
        assert!(selection.is_empty());
        assert!(selection.ids().is_empty());
        assert_eq!(selection.options_for(&id("film-grain")), None);
    }

    #[test]
    fn test_add_is_idempotent_and_keeps_options() {
        let options = AdapterOptions {
            strength: Some(0.7),
            ..Default::default()
        };
        let selection = AdapterSelection::new()
            .with_added(id("a"))
            .with_options(&id("a"), options)
            .with_added(id("a"));
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.options_for(&id("a")), Some(options));
    }

    #[test]
    fn test_operations_do_not_mutate_receiver() {
        let original = AdapterSelection::new().with_added(id("a"));
        let _ = original.with_added(id("b"));
        let _ = original.without(&id("a"));
        assert_eq!(original.ids(), vec![id("a")]);
    }

    #[test]
    fn test_toggle() {
        let selection = AdapterSelection::new().toggled(id("a"));
        assert!(selection.contains(&id("a")));
        let selection = selection.toggled(id("a"));
        assert!(!selection.contains(&id("a")));
    }

    #[test]
    fn test_options_for_unselected_adapter_are_ignored() {
        let selection = AdapterSelection::new().with_options(
            &id("ghost"),
            AdapterOptions {
                weight: Some(1.0),
                ..Default::default()
            },
        );
        assert!(selection.is_empty());
        assert_eq!(selection.options_for(&id("ghost")), None);
    }

    #[test]
    fn test_snapshot_preserves_selection_order() {
        let selection = AdapterSelection::new()
            .with_added(id("b"))
            .with_added(id("a"))
            .with_added(id("c"));
        let ids: Vec<_> = selection
            .snapshot()
            .iter()
            .map(|entry| entry.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_option_assignment() {
        let options = AdapterOptions::default()
            .with_assignment("strength=0.8")
            .unwrap()
            .with_assignment(" clip_strength = 0.5 ")
            .unwrap();
        assert_eq!(options.strength, Some(0.8));
        assert_eq!(options.clip_strength, Some(0.5));
        assert_eq!(options.weight, None);
    }

    #[test]
    fn test_option_assignment_errors() {
        assert!(AdapterOptions::default().with_assignment("strength").is_err());
        assert!(AdapterOptions::default().with_assignment("strength=high").is_err());
        assert!(AdapterOptions::default().with_assignment("gain=1.0").is_err());
    }

    #[test]
    fn test_options_serialize_without_unset_fields() {
        let options = AdapterOptions {
            strength: Some(1.0),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(options).unwrap(),
            serde_json::json!({"strength": 1.0})
        );
    }
}
