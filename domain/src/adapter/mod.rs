//! Image-generation adapter (LoRA) domain.
//!
//! - [`selection::AdapterSelection`] — selected adapters and their options
//! - [`selection::AdapterSnapshot`] — the selection captured for one job
//! - [`active::ActiveAdapters`] — adapters already applied within a job

pub mod active;
pub mod selection;
