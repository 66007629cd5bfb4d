//! Session domain entities

use crate::image::binary::ResourceHandle;
use serde::{Deserialize, Serialize};

/// Role of a model-facing history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A model-facing conversation record, sent with every request (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Who a transcript message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Speaker {
    User,
    Assistant,
}

/// What a transcript message displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

/// A user-facing transcript message (Entity)
///
/// Assistant text messages are updated in place while a response streams
/// in. `is_generating` is only true between directive detection and the
/// arrival of the image result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    pub role: Speaker,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<ResourceHandle>,
    #[serde(default)]
    pub is_generating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl TranscriptMessage {
    fn new(role: Speaker, kind: MessageKind, content: String) -> Self {
        Self {
            role,
            kind,
            content,
            handle: None,
            is_generating: false,
            progress: None,
        }
    }

    pub fn user_text(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, MessageKind::Text, content.into())
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, MessageKind::Text, content.into())
    }

    pub fn assistant_image(handle: ResourceHandle) -> Self {
        let mut message = Self::new(Speaker::Assistant, MessageKind::Image, String::new());
        message.handle = Some(handle);
        message
    }

    pub fn is_image(&self) -> bool {
        self.kind == MessageKind::Image
    }

    /// Mark this message as the placeholder for a running generation job,
    /// optionally replacing its text with a status line.
    pub fn begin_generation(&mut self, status: Option<&str>) {
        if let Some(status) = status {
            self.content = status.to_string();
        }
        self.is_generating = true;
        self.progress = Some(0);
    }

    pub fn set_progress(&mut self, percent: u8) {
        self.progress = Some(percent.min(100));
    }

    pub fn finish_generation(&mut self) {
        self.is_generating = false;
        self.progress = None;
    }

    /// End a failed generation, replacing the status line with `notice`.
    pub fn fail_generation(&mut self, notice: &str) {
        self.finish_generation();
        self.content = notice.to_string();
    }

    /// Copy suitable for durable storage: handles and transient generation
    /// state are process-lifetime only.
    pub fn to_persisted(&self) -> Self {
        Self {
            role: self.role,
            kind: self.kind,
            content: self.content.clone(),
            handle: if self.is_image() {
                None
            } else {
                self.handle.clone()
            },
            is_generating: false,
            progress: None,
        }
    }
}
