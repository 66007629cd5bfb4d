//! Binary image results and the opaque handles that reference them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A generated image as returned by the image backend (Value Object)
///
/// Equality and hashing are by content: two results with the same bytes
/// and media type are the same binary value. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryImage {
    data: Arc<[u8]>,
    media_type: String,
}

impl BinaryImage {
    pub fn new(data: impl Into<Arc<[u8]>>, media_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
        }
    }

    pub fn png(data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(data, "image/png")
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension matching the media type
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Opaque, process-lifetime reference to a [`BinaryImage`]
///
/// Handles are never valid across restarts, so they are stripped before
/// the transcript is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
