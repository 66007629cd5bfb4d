//! Application-level configuration.
//!
//! - [`SessionParams`] — orchestration and persistence control

pub mod session_params;

pub use session_params::{DEFAULT_FAILURE_NOTICE, SessionParams};
