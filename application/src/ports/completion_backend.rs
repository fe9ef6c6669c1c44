//! Completion backend port
//!
//! Defines the interface shared by every way of obtaining a text completion:
//! the persistent CLI subprocess and the stateless remote API.

use async_trait::async_trait;
use memvault_domain::{CompletionMode, DomainError, ProviderState};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while obtaining a completion
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Failed to start completion process: {0}")]
    SpawnFailed(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion failed: {0}")]
    TurnFailed(String),

    #[error("Completion process exited: {0}")]
    ProcessExited(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("No API key configured (set {0})")]
    MissingCredential(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] DomainError),

    #[error("Other error: {0}")]
    Other(String),
}

impl CompletionError {
    /// Stable short name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::SpawnFailed(_) => "spawn_failed",
            CompletionError::Timeout(_) => "timeout",
            CompletionError::TurnFailed(_) => "turn_failed",
            CompletionError::ProcessExited(_) => "process_exited",
            CompletionError::RequestFailed(_) => "request_failed",
            CompletionError::MissingCredential(_) => "missing_credential",
            CompletionError::InvalidRequest(_) => "invalid_request",
            CompletionError::Other(_) => "other",
        }
    }

    /// Infrastructure-level failures concern the backend itself rather than
    /// the individual call.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            CompletionError::SpawnFailed(_) | CompletionError::ProcessExited(_)
        )
    }
}

/// A finished completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutput {
    pub text: String,
    /// Time from dispatching the request to receiving its terminal response.
    pub latency: Duration,
}

/// A source of text completions.
///
/// Implementations (adapters) live in the infrastructure layer. The
/// completion service holds exactly one, chosen at construction.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Which mode this backend implements.
    fn mode(&self) -> CompletionMode;

    /// Prepare the backend. Idempotent.
    ///
    /// Returns `Ok(false)` when the backend is not usable but nothing failed
    /// (e.g. no credential configured).
    async fn initialize(&self) -> Result<bool, CompletionError>;

    /// Complete an already composed prompt.
    async fn complete(&self, text: &str) -> Result<CompletionOutput, CompletionError>;

    /// Release any held resources. Idempotent.
    async fn shutdown(&self) -> Result<(), CompletionError>;

    /// Current lifecycle state.
    fn state(&self) -> ProviderState;

    /// OS process id of the backing process, if any.
    fn pid(&self) -> Option<u32> {
        None
    }

    /// Whether a credential for the remote API is configured.
    fn has_api_key(&self) -> bool {
        false
    }
}
