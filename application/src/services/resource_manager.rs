//! Resource lifecycle management for generated images.
//!
//! [`ResourceManager`] keeps a bijection between binary images and the
//! handles created for them. Acquiring the same binary twice returns the
//! same handle; releasing removes both directions under one lock and frees
//! the handle through the [`HandleBackend`].

use crate::ports::handle_backend::{HandleBackend, HandleError};
use cud_domain::{BinaryImage, ResourceHandle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Counts of tracked entries in each direction; always equal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub handles: usize,
    pub binaries: usize,
}

#[derive(Default)]
struct HandleMap {
    by_binary: HashMap<BinaryImage, ResourceHandle>,
    by_handle: HashMap<ResourceHandle, BinaryImage>,
    /// Live handles in creation order
    order: Vec<ResourceHandle>,
}

impl HandleMap {
    fn remove(&mut self, handle: &ResourceHandle) -> bool {
        let Some(binary) = self.by_handle.remove(handle) else {
            return false;
        };
        self.by_binary.remove(&binary);
        self.order.retain(|h| h != handle);
        true
    }
}

pub struct ResourceManager {
    backend: Arc<dyn HandleBackend>,
    map: Mutex<HandleMap>,
}

impl ResourceManager {
    pub fn new(backend: Arc<dyn HandleBackend>) -> Self {
        Self {
            backend,
            map: Mutex::new(HandleMap::default()),
        }
    }

    fn map(&self) -> MutexGuard<'_, HandleMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle for `binary`, creating one only if none is tracked.
    pub fn acquire(&self, binary: &BinaryImage) -> Result<ResourceHandle, HandleError> {
        let mut map = self.map();
        if let Some(existing) = map.by_binary.get(binary) {
            return Ok(existing.clone());
        }

        let handle = self.backend.create(binary)?;
        debug!("Created handle {} ({} bytes)", handle, binary.len());
        map.by_binary.insert(binary.clone(), handle.clone());
        map.by_handle.insert(handle.clone(), binary.clone());
        map.order.push(handle.clone());
        Ok(handle)
    }

    /// Acquire handles for every binary, in order. On failure, handles
    /// created by this call are released again.
    pub fn acquire_all(&self, binaries: &[BinaryImage]) -> Result<Vec<ResourceHandle>, HandleError> {
        let mut handles = Vec::with_capacity(binaries.len());
        for binary in binaries {
            let already_tracked = self.contains_binary(binary);
            match self.acquire(binary) {
                Ok(handle) => handles.push((handle, !already_tracked)),
                Err(e) => {
                    for (handle, created) in &handles {
                        if *created {
                            self.release(handle);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(handles.into_iter().map(|(handle, _)| handle).collect())
    }

    /// Release `handle`. Unknown or already-released handles are a no-op.
    pub fn release(&self, handle: &ResourceHandle) {
        let removed = self.map().remove(handle);
        if removed {
            self.backend.revoke(handle);
            debug!("Released handle {}", handle);
        }
    }

    /// Release the handle tracked for each binary, if any.
    pub fn release_for(&self, binaries: &[BinaryImage]) {
        for binary in binaries {
            if let Some(handle) = self.lookup(binary) {
                self.release(&handle);
            }
        }
    }

    /// Release every tracked handle. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let drained: Vec<ResourceHandle> = {
            let mut map = self.map();
            map.by_binary.clear();
            map.by_handle.clear();
            std::mem::take(&mut map.order)
        };
        for handle in &drained {
            self.backend.revoke(handle);
        }
        if !drained.is_empty() {
            debug!("Released all {} handles", drained.len());
        }
        drained.len()
    }

    /// Tracked handle for `binary`, without creating one
    pub fn lookup(&self, binary: &BinaryImage) -> Option<ResourceHandle> {
        self.map().by_binary.get(binary).cloned()
    }

    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.map().by_handle.contains_key(handle)
    }

    fn contains_binary(&self, binary: &BinaryImage) -> bool {
        self.map().by_binary.contains_key(binary)
    }

    pub fn binary_for(&self, handle: &ResourceHandle) -> Option<BinaryImage> {
        self.map().by_handle.get(handle).cloned()
    }

    pub fn stats(&self) -> ResourceStats {
        let map = self.map();
        ResourceStats {
            handles: map.by_handle.len(),
            binaries: map.by_binary.len(),
        }
    }

    /// Live handles, oldest first
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.map().order.clone()
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::handle_backend::InMemoryHandleBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that records revocations and can be told to fail
    #[derive(Default)]
    struct RecordingBackend {
        inner: InMemoryHandleBackend,
        revoked: Mutex<Vec<ResourceHandle>>,
        fail_after: Option<usize>,
        created: AtomicUsize,
    }

    impl HandleBackend for RecordingBackend {
        fn create(&self, binary: &BinaryImage) -> Result<ResourceHandle, HandleError> {
            let created = self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| created >= limit) {
                return Err(HandleError("disk full".to_string()));
            }
            self.inner.create(binary)
        }

        fn revoke(&self, handle: &ResourceHandle) {
            self.revoked.lock().unwrap().push(handle.clone());
        }
    }

    fn image(byte: u8) -> BinaryImage {
        BinaryImage::png(vec![byte; 8])
    }

    #[test]
    fn test_acquire_is_deduplicated_by_content() {
        let manager = ResourceManager::new(Arc::new(InMemoryHandleBackend::new()));
        let first = manager.acquire(&image(1)).unwrap();
        let second = manager.acquire(&image(1)).unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.stats(), ResourceStats { handles: 1, binaries: 1 });
    }

    #[test]
    fn test_release_then_acquire_creates_new_handle() {
        let manager = ResourceManager::new(Arc::new(InMemoryHandleBackend::new()));
        let first = manager.acquire(&image(1)).unwrap();
        manager.release(&first);
        assert!(!manager.contains(&first));
        assert_eq!(manager.lookup(&image(1)), None);

        let second = manager.acquire(&image(1)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_release_unknown_handle_is_noop() {
        let backend = Arc::new(RecordingBackend::default());
        let manager = ResourceManager::new(backend.clone());
        let handle = manager.acquire(&image(1)).unwrap();

        manager.release(&handle);
        manager.release(&handle);
        manager.release(&ResourceHandle::new("mem://image/unknown"));
        assert_eq!(backend.revoked.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_release_all_leaves_nothing_behind() {
        let backend = Arc::new(RecordingBackend::default());
        let manager = ResourceManager::new(backend.clone());
        manager.acquire(&image(1)).unwrap();
        manager.acquire(&image(2)).unwrap();

        assert_eq!(manager.release_all(), 2);
        assert_eq!(manager.stats(), ResourceStats::default());
        assert!(manager.handles().is_empty());
        assert_eq!(backend.revoked.lock().unwrap().len(), 2);
        assert_eq!(manager.release_all(), 0);
    }

    #[test]
    fn test_bijection_holds() {
        let manager = ResourceManager::new(Arc::new(InMemoryHandleBackend::new()));
        let handles = manager
            .acquire_all(&[image(1), image(2), image(1)])
            .unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(handles[0], handles[2]);

        for handle in manager.handles() {
            let binary = manager.binary_for(&handle).unwrap();
            assert_eq!(manager.lookup(&binary), Some(handle));
        }
        assert_eq!(manager.handles(), vec![handles[0].clone(), handles[1].clone()]);
    }

    #[test]
    fn test_acquire_all_rolls_back_on_failure() {
        let backend = Arc::new(RecordingBackend {
            fail_after: Some(2),
            ..Default::default()
        });
        let manager = ResourceManager::new(backend.clone());
        let kept = manager.acquire(&image(9)).unwrap();

        let result = manager.acquire_all(&[image(9), image(1), image(2)]);
        assert!(result.is_err());
        assert_eq!(manager.handles(), vec![kept]);
        assert_eq!(backend.revoked.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_release_for_binaries() {
        let manager = ResourceManager::new(Arc::new(InMemoryHandleBackend::new()));
        manager.acquire(&image(1)).unwrap();
        manager.acquire(&image(2)).unwrap();
        manager.release_for(&[image(1), image(3)]);
        assert_eq!(manager.stats().handles, 1);
        assert!(manager.lookup(&image(2)).is_some());
    }

    #[test]
    fn test_drop_revokes_remaining_handles() {
        let backend = Arc::new(RecordingBackend::default());
        {
            let manager = ResourceManager::new(backend.clone());
            manager.acquire(&image(1)).unwrap();
        }
        assert_eq!(backend.revoked.lock().unwrap().len(), 1);
    }
}
