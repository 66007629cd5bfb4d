//! Core domain concepts shared across all subdomains.
//!
//! - [`model::ModelId`] — chat personas served by the language-model endpoint
//! - [`user_input::UserInput`] — a validated, non-empty user message
//! - [`error::DomainError`] — domain-level errors

pub mod error;
pub mod model;
pub mod user_input;
