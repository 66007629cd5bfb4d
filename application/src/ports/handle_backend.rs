//! Handle backend port
//!
//! Materialises a [`ResourceHandle`] for a binary image and frees it again.
//! The [`ResourceManager`](crate::services::resource_manager::ResourceManager)
//! owns the deduplicating map on top of this port.

use cud_domain::{BinaryImage, ResourceHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to create image handle: {0}")]
pub struct HandleError(pub String);

pub trait HandleBackend: Send + Sync {
    /// Create a fresh handle for `binary`. Never reuses a handle.
    fn create(&self, binary: &BinaryImage) -> Result<ResourceHandle, HandleError>;

    /// Free the resource behind `handle`. Unknown handles are ignored.
    fn revoke(&self, handle: &ResourceHandle);
}

/// Backend whose handles are plain counters; nothing to free
#[derive(Default)]
pub struct InMemoryHandleBackend {
    next: AtomicU64,
}

impl InMemoryHandleBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandleBackend for InMemoryHandleBackend {
    fn create(&self, binary: &BinaryImage) -> Result<ResourceHandle, HandleError> {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(ResourceHandle::new(format!(
            "mem://image/{id}.{}",
            binary.extension()
        )))
    }

    fn revoke(&self, _handle: &ResourceHandle) {}
}
