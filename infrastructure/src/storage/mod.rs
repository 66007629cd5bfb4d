//! Local persistence adapters.

pub mod file_handle_backend;
pub mod file_state_store;

pub use file_handle_backend::FileHandleBackend;
pub use file_state_store::FileStateStore;
