//! Completion backend selection.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which backend serves completions.
///
/// Selected once at construction; the completion service never branches on
/// it at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// One long-running CLI subprocess reused across many calls.
    #[default]
    Persistent,
    /// One HTTP round trip per call, no shared process.
    Remote,
}

impl CompletionMode {
    /// Get a short description for display
    pub fn short_description(&self) -> &'static str {
        match self {
            CompletionMode::Persistent => "persistent CLI subprocess",
            CompletionMode::Remote => "stateless remote API",
        }
    }
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionMode::Persistent => write!(f, "persistent"),
            CompletionMode::Remote => write!(f, "remote"),
        }
    }
}

impl std::str::FromStr for CompletionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "persistent" | "cli" | "subprocess" => Ok(CompletionMode::Persistent),
            "remote" | "api" | "http" => Ok(CompletionMode::Remote),
            _ => Err(DomainError::InvalidMode(s.to_string())),
        }
    }
}
