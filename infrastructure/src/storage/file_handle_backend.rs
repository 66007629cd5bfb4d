//! Handles backed by files in a cache directory.
//!
//! Each created handle is a `file://` URL to a freshly written image file;
//! revoking it deletes the file. Files are named by a per-process counter,
//! so handles from an earlier run are never reused.

use cud_application::{HandleBackend, HandleError};
use cud_domain::{BinaryImage, ResourceHandle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

const URL_PREFIX: &str = "file://";

pub struct FileHandleBackend {
    dir: PathBuf,
    prefix: String,
    next: AtomicU64,
}

impl FileHandleBackend {
    /// Create the cache directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, HandleError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            HandleError(format!("Cannot create image directory {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            prefix: format!("image-{}", std::process::id()),
            next: AtomicU64::new(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path behind a handle created by this backend
    pub fn path_of(&self, handle: &ResourceHandle) -> Option<PathBuf> {
        let path = PathBuf::from(handle.as_str().strip_prefix(URL_PREFIX)?);
        path.starts_with(&self.dir).then_some(path)
    }
}

impl HandleBackend for FileHandleBackend {
    fn create(&self, binary: &BinaryImage) -> Result<ResourceHandle, HandleError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let path = self
            .dir
            .join(format!("{}-{}.{}", self.prefix, n, binary.extension()));
        fs::write(&path, binary.data())
            .map_err(|e| HandleError(format!("Cannot write {}: {}", path.display(), e)))?;
        debug!("Wrote {} bytes to {}", binary.len(), path.display());
        Ok(ResourceHandle::new(format!("{}{}", URL_PREFIX, path.display())))
    }

    fn revoke(&self, handle: &ResourceHandle) {
        let Some(path) = self.path_of(handle) else {
            warn!("Not a handle from this backend: {}", handle);
            return;
        };
        if let Err(e) = fs::remove_file(&path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
