//! Port definitions (interfaces for external adapters)
//!
//! Ports define the boundaries between the application layer and the
//! outside world; adapters in the infrastructure layer implement them.

pub mod chat_gateway;
pub mod conversation_logger;
pub mod handle_backend;
pub mod image_generator;
pub mod state_store;
pub mod turn_progress;
