//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Input cannot be empty")]
    EmptyInput,

    #[error("Invalid resolution preset: {0}")]
    InvalidResolution(String),

    #[error("Invalid adapter option '{key}': {reason}")]
    InvalidAdapterOption { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_resolution_display() {
        let error = DomainError::InvalidResolution("wide".to_string());
        assert_eq!(error.to_string(), "Invalid resolution preset: wide");
    }

    #[test]
    fn test_invalid_adapter_option_display() {
        let error = DomainError::InvalidAdapterOption {
            key: "strength".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid adapter option 'strength': not a number"
        );
    }
}
