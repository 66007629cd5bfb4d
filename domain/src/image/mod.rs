//! Image generation domain.
//!
//! - [`preset::Resolution`] / [`preset::PresetTable`] — the fixed resolution presets
//! - [`binary::BinaryImage`] — a generated image
//! - [`binary::ResourceHandle`] — an opaque reference to a tracked image

pub mod binary;
pub mod preset;
