//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid completion mode: {0}")]
    InvalidMode(String),

    #[error("Prompt cannot be empty")]
    EmptyPrompt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_mode_display() {
        let error = DomainError::InvalidMode("carrier-pigeon".to_string());
        assert_eq!(error.to_string(), "Invalid completion mode: carrier-pigeon");
    }

    #[test]
    fn test_empty_prompt_display() {
        assert_eq!(DomainError::EmptyPrompt.to_string(), "Prompt cannot be empty");
    }
}
