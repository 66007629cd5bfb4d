//! Application layer for cud-chat
//!
//! This crate contains use cases, stateful services, port definitions, and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod services;
pub mod use_cases;

// Re-export commonly used types
pub use config::{DEFAULT_FAILURE_NOTICE, SessionParams};
pub use ports::{
    chat_gateway::{ChatGateway, ChatRequest, ChunkStream, GatewayError},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    handle_backend::{HandleBackend, HandleError, InMemoryHandleBackend},
    image_generator::{
        GenerationProgress, ImageError, ImageGenerator, ImageRequest, NoGenerationProgress,
    },
    state_store::{MemoryStateStore, StateStore},
    turn_progress::{NoTurnProgress, TurnProgressNotifier},
};
pub use services::{
    adapter_session::AdapterSessionManager,
    persistence::DeferredPersistence,
    resource_manager::{ResourceManager, ResourceStats},
};
pub use use_cases::converse::{
    ConversationOrchestrator, SessionView, TurnError, TurnOutcome,
};
pub use use_cases::generate_image::{
    GenerateImageError, GenerateImageInput, GenerateImageUseCase, GeneratedImages,
};
