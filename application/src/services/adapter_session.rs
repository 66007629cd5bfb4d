//! Adapter session management.
//!
//! [`AdapterSessionManager`] is the only place the live adapter selection
//! changes. It swaps in a new immutable [`AdapterSelection`] per operation,
//! so a [`snapshot`](AdapterSessionManager::snapshot) taken for a running
//! job is unaffected by later UI changes.

use cud_domain::{AdapterId, AdapterOptions, AdapterSelection, AdapterSnapshot};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Default)]
pub struct AdapterSessionManager {
    selection: RwLock<AdapterSelection>,
}

impl AdapterSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in the selection returned by `f` under one write lock, passing
    /// through the value computed alongside it.
    fn update_with<T>(&self, f: impl FnOnce(&AdapterSelection) -> (AdapterSelection, T)) -> T {
        let mut current = self
            .selection
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let (next, result) = f(&current);
        *current = next;
        result
    }

    fn update(&self, f: impl FnOnce(&AdapterSelection) -> AdapterSelection) -> bool {
        self.update_with(|current| {
            let next = f(current);
            let changed = next != *current;
            (next, changed)
        })
    }

    /// Select `id` with default options. Returns `false` if it was already
    /// selected, in which case its options are kept.
    pub fn add(&self, id: AdapterId) -> bool {
        debug!("Adapter add: {}", id);
        self.update(|s| s.with_added(id))
    }

    /// Deselect `id` together with its options.
    pub fn remove(&self, id: &AdapterId) -> bool {
        debug!("Adapter remove: {}", id);
        self.update(|s| s.without(id))
    }

    /// Flip selection of `id`. Returns whether it is selected afterwards.
    pub fn toggle(&self, id: AdapterId) -> bool {
        self.update_with(|s| {
            let next = s.toggled(id.clone());
            let selected = next.contains(&id);
            (next, selected)
        })
    }

    /// Replace the options of a selected adapter. Returns `false` if `id`
    /// is not selected.
    pub fn set_options(&self, id: &AdapterId, options: AdapterOptions) -> bool {
        self.update_with(|s| {
            if s.contains(id) {
                (s.with_options(id, options), true)
            } else {
                (s.clone(), false)
            }
        })
    }

    pub fn is_selected(&self, id: &AdapterId) -> bool {
        self.current().contains(id)
    }

    /// Selected adapter ids, in selection order
    pub fn selection(&self) -> Vec<AdapterId> {
        self.current().ids()
    }

    /// Options of `id`; defaults when unselected
    pub fn options_for(&self, id: &AdapterId) -> AdapterOptions {
        self.current().options_for(id).unwrap_or_default()
    }

    /// Selection and options captured for one generation job
    pub fn snapshot(&self) -> AdapterSnapshot {
        self.current().snapshot()
    }

    /// Deselect everything.
    pub fn clear(&self) {
        self.update(|_| AdapterSelection::new());
    }

    fn current(&self) -> AdapterSelection {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong() -> AdapterOptions {
        AdapterOptions {
            strength: Some(0.9),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_is_idempotent_and_keeps_options() {
        let manager = AdapterSessionManager::new();
        let id = AdapterId::new("film_grain");
        assert!(manager.add(id.clone()));
        assert!(manager.set_options(&id, strong()));

        assert!(!manager.add(id.clone()));
        assert_eq!(manager.options_for(&id), strong());
        assert_eq!(manager.selection(), vec![id]);
    }

    #[test]
    fn test_add_then_remove_leaves_no_residue() {
        let manager = AdapterSessionManager::new();
        let id = AdapterId::new("film_grain");
        manager.add(id.clone());
        manager.set_options(&id, strong());
        assert!(manager.remove(&id));

        assert!(manager.selection().is_empty());
        assert!(manager.snapshot().is_empty());
        assert_eq!(manager.options_for(&id), AdapterOptions::default());

        // Re-adding starts from defaults
        manager.add(id.clone());
        assert_eq!(manager.options_for(&id), AdapterOptions::default());
    }

    #[test]
    fn test_set_options_requires_selection() {
        let manager = AdapterSessionManager::new();
        assert!(!manager.set_options(&AdapterId::new("ghost"), strong()));
        assert!(manager.selection().is_empty());
    }

    #[test]
    fn test_toggle() {
        let manager = AdapterSessionManager::new();
        let id = AdapterId::new("detail");
        assert!(manager.toggle(id.clone()));
        assert!(!manager.toggle(id.clone()));
        assert!(!manager.is_selected(&id));
    }

    #[test]
    fn test_concurrent_toggles_report_the_state_they_produced() {
        let manager = AdapterSessionManager::new();
        let id = AdapterId::new("detail");

        let results: Vec<bool> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..500)
                            .map(|_| manager.toggle(id.clone()))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        // Every toggle flips the state exactly once, so with an even count
        // the "on" and "off" results pair up and the adapter ends deselected
        let on = results.iter().filter(|selected| **selected).count();
        assert_eq!(on, results.len() - on);
        assert!(!manager.is_selected(&id));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_changes() {
        let manager = AdapterSessionManager::new();
        manager.add(AdapterId::new("a"));
        let snapshot = manager.snapshot();

        manager.add(AdapterId::new("b"));
        manager.remove(&AdapterId::new("a"));

        let ids: Vec<_> = snapshot.iter().map(|e| e.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_clear() {
        let manager = AdapterSessionManager::new();
        manager.add(AdapterId::new("a"));
        manager.clear();
        assert!(manager.selection().is_empty());
    }
}
