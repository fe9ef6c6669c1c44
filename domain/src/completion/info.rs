//! Read-only description of the active provider.

use super::mode::CompletionMode;
use super::state::ProviderState;
use serde::{Deserialize, Serialize};

/// What `info()` reports about the provider backing the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub mode: CompletionMode,
    /// OS process id of the backing subprocess, if one is running.
    pub pid: Option<u32>,
    pub state: ProviderState,
    /// Whether a credential is configured for the remote backend.
    pub has_api_key: bool,
}
