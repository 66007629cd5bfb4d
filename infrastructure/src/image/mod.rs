//! Image backend adapters.

pub mod comfyui;
pub mod workflow;

pub use comfyui::{ComfyUiImageGenerator, ComfyUiSettings};
