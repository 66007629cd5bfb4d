//! Progress display for turns and generation jobs

pub mod reporter;
