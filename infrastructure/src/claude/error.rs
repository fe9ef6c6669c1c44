//! Error types for the completion CLI adapter

use memvault_application::CompletionError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for completion CLI operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur when driving the completion CLI subprocess
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to spawn completion CLI: {0}")]
    Spawn(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Turn failed: {0}")]
    TurnFailed(String),

    #[error("Turn timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion process exited: {0}")]
    ProcessExited(String),

    #[error("A turn is already in flight")]
    TurnInFlight,
}

impl From<ProviderError> for CompletionError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Spawn(msg) => CompletionError::SpawnFailed(msg),
            ProviderError::TurnFailed(msg) => CompletionError::TurnFailed(msg),
            ProviderError::Timeout(after) => CompletionError::Timeout(after),
            ProviderError::ProcessExited(msg) => CompletionError::ProcessExited(msg),
            other => CompletionError::Other(other.to_string()),
        }
    }
}
