//! Generate Image use case.
//!
//! Runs one image-generation job: captures the adapter selection, calls
//! the [`ImageGenerator`], and turns every returned image into a tracked
//! [`ResourceHandle`]. Used by the conversation orchestrator when a reply
//! carries a directive, and directly for explicit generation requests.

use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::handle_backend::HandleError;
use crate::ports::image_generator::{GenerationProgress, ImageError, ImageGenerator, ImageRequest};
use crate::services::adapter_session::AdapterSessionManager;
use crate::services::resource_manager::ResourceManager;
use cud_domain::util::preview;
use cud_domain::{AdapterSnapshot, GenerationDirective, ResourceHandle, Resolution};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur during image generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateImageError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Handle(#[from] HandleError),
}

/// Input for the [`GenerateImageUseCase`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateImageInput {
    pub prompt: String,
    pub negative: Option<String>,
    pub resolution: Resolution,
}

impl GenerateImageInput {
    pub fn new(prompt: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            prompt: prompt.into(),
            negative: None,
            resolution,
        }
    }
}

impl From<&GenerationDirective> for GenerateImageInput {
    fn from(directive: &GenerationDirective) -> Self {
        Self {
            prompt: directive.prompt.clone(),
            negative: directive.negative.clone(),
            resolution: directive.resolution,
        }
    }
}

/// Output of a successful job
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImages {
    /// One handle per returned image, in backend order
    pub handles: Vec<ResourceHandle>,
    /// Adapter selection the job ran with
    pub adapters: AdapterSnapshot,
}

#[derive(Clone)]
pub struct GenerateImageUseCase {
    generator: Arc<dyn ImageGenerator>,
    adapters: Arc<AdapterSessionManager>,
    resources: Arc<ResourceManager>,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl GenerateImageUseCase {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        adapters: Arc<AdapterSessionManager>,
        resources: Arc<ResourceManager>,
    ) -> Self {
        Self {
            generator,
            adapters,
            resources,
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn generator(&self) -> &Arc<dyn ImageGenerator> {
        &self.generator
    }

    pub fn adapters(&self) -> &Arc<AdapterSessionManager> {
        &self.adapters
    }

    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    pub async fn execute(
        &self,
        input: GenerateImageInput,
        progress: &dyn GenerationProgress,
    ) -> Result<GeneratedImages, GenerateImageError> {
        let snapshot = self.adapters.snapshot();
        info!(
            "Generating {} image with {} adapter(s): {}",
            input.resolution,
            snapshot.len(),
            preview(&input.prompt, 100)
        );

        let mut request =
            ImageRequest::new(input.prompt.clone(), input.resolution).with_adapters(snapshot.clone());
        request.negative = input.negative.clone();

        let result = self
            .generator
            .generate(&request, progress)
            .await
            .and_then(|images| {
                if images.is_empty() {
                    Err(ImageError::NoOutput)
                } else {
                    Ok(images)
                }
            });

        let images = match result {
            Ok(images) => images,
            Err(e) => {
                warn!("Image generation failed: {}", e);
                self.log_failure(&input, &e.to_string());
                return Err(e.into());
            }
        };

        let handles = self.resources.acquire_all(&images).inspect_err(|e| {
            warn!("Could not track generated images: {}", e);
            self.log_failure(&input, &e.to_string());
        })?;

        info!("Generated {} image(s)", handles.len());
        self.conversation_logger.log(ConversationEvent::new(
            "image_generated",
            serde_json::json!({
                "prompt": input.prompt,
                "resolution": input.resolution,
                "adapters": snapshot,
                "handles": handles,
                "bytes": images.iter().map(|i| i.len()).sum::<usize>(),
            }),
        ));

        Ok(GeneratedImages {
            handles,
            adapters: snapshot,
        })
    }

    fn log_failure(&self, input: &GenerateImageInput, error: &str) {
        self.conversation_logger.log(ConversationEvent::new(
            "image_failed",
            serde_json::json!({
                "prompt": input.prompt,
                "resolution": input.resolution,
                "error": error,
            }),
        ));
    }
}
