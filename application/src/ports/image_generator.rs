//! Image generator port
//!
//! Defines the interface to the image-generation backend: submitting one
//! job and listing the adapters it can apply.

use async_trait::async_trait;
use cud_domain::{AdapterId, AdapterSnapshot, BinaryImage, Resolution};
use thiserror::Error;

/// Errors that can occur during image generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Backend rejected the job: {0}")]
    Rejected(String),

    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    #[error("Backend returned no images")]
    NoOutput,

    #[error("Other error: {0}")]
    Other(String),
}

/// One generation job.
///
/// `adapters` is the selection captured when the job was created; changes
/// to the live selection afterwards do not reach a job in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative: Option<String>,
    pub resolution: Resolution,
    pub adapters: AdapterSnapshot,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            prompt: prompt.into(),
            negative: None,
            resolution,
            adapters: AdapterSnapshot::default(),
        }
    }

    pub fn with_negative(mut self, negative: impl Into<String>) -> Self {
        self.negative = Some(negative.into());
        self
    }

    pub fn with_adapters(mut self, adapters: AdapterSnapshot) -> Self {
        self.adapters = adapters;
        self
    }
}

/// Receives coarse progress (0..=100) of a running job
pub trait GenerationProgress: Send + Sync {
    fn on_progress(&self, percent: u8);
}

/// No-op progress for callers that do not display it
pub struct NoGenerationProgress;

impl GenerationProgress for NoGenerationProgress {
    fn on_progress(&self, _percent: u8) {}
}

/// Image-generation backend
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Run one job to completion and return every image it produced.
    async fn generate(
        &self,
        request: &ImageRequest,
        progress: &dyn GenerationProgress,
    ) -> Result<Vec<BinaryImage>, ImageError>;

    /// Adapters the backend can apply. Used by the UI only.
    async fn list_adapters(&self) -> Result<Vec<AdapterId>, ImageError>;
}
