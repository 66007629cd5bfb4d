//! Stateful application services shared by the use cases.
//!
//! - [`resource_manager::ResourceManager`] — deduplicated image handles
//! - [`adapter_session::AdapterSessionManager`] — live LoRA selection
//! - [`persistence::DeferredPersistence`] — debounced background saves

pub mod adapter_session;
pub mod persistence;
pub mod resource_manager;
