//! Per-job record of adapters already folded into the generation pipeline.

use super::selection::{AdapterId, AdapterSnapshot, SelectedAdapter};
use std::collections::BTreeSet;

/// Adapters already applied within the current generation job.
///
/// Created fresh for every job and never persisted. A pipeline builder
/// that walks the snapshot more than once uses this set to apply each
/// adapter at most once.
#[derive(Debug, Clone, Default)]
pub struct ActiveAdapters {
    active: BTreeSet<AdapterId>,
}

impl ActiveAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an adapter as applied. Returns `false` if it already was.
    pub fn try_activate(&mut self, id: &AdapterId) -> bool {
        self.active.insert(id.clone())
    }

    pub fn is_active(&self, id: &AdapterId) -> bool {
        self.active.contains(id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Adapters from `snapshot` not yet applied in this job, marking each
    /// returned adapter as applied.
    pub fn take_unapplied<'a>(&mut self, snapshot: &'a AdapterSnapshot) -> Vec<&'a SelectedAdapter> {
        snapshot
            .iter()
            .filter(|entry| self.try_activate(&entry.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::selection::AdapterSelection;

    fn snapshot(ids: &[&str]) -> AdapterSnapshot {
        ids.iter()
            .fold(AdapterSelection::new(), |selection, id| {
                selection.with_added(AdapterId::new(*id))
            })
            .snapshot()
    }

    #[test]
    fn test_second_pass_applies_nothing() {
        let snapshot = snapshot(&["a", "b"]);
        let mut active = ActiveAdapters::new();

        let first: Vec<_> = active.take_unapplied(&snapshot);
        assert_eq!(first.len(), 2);

        let second = active.take_unapplied(&snapshot);
        assert!(second.is_empty());
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn test_try_activate_reports_duplicates() {
        let mut active = ActiveAdapters::new();
        let id = AdapterId::new("a");
        assert!(active.try_activate(&id));
        assert!(!active.try_activate(&id));
        assert!(active.is_active(&id));
    }
}
