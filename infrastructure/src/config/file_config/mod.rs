//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into adapter settings with
//! the `to_*` methods.

mod anthropic;
mod cli;
mod completion;
mod logging;

pub use anthropic::FileAnthropicConfig;
pub use cli::FileCliConfig;
pub use completion::FileCompletionConfig;
pub use logging::FileLoggingConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("completion.mode: unknown mode '{0}' (expected 'persistent' or 'remote')")]
    InvalidMode(String),

    #[error("cli.command cannot be empty")]
    EmptyCommand,

    #[error("{0} cannot be 0")]
    ZeroValue(&'static str),

    #[error("cli.shutdown_grace_ms must be shorter than cli.shutdown_deadline_secs")]
    GraceExceedsDeadline,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Which backend serves completions
    pub completion: FileCompletionConfig,
    /// Persistent CLI subprocess settings
    pub cli: FileCliConfig,
    /// Remote API settings
    pub anthropic: FileAnthropicConfig,
    /// Conversation log settings
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Check values that would make the provider unusable.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.completion.parse_mode()?;

        if self.cli.command.trim().is_empty() {
            return Err(ConfigValidationError::EmptyCommand);
        }
        if self.cli.turn_timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("cli.turn_timeout_secs"));
        }
        if self.cli.shutdown_deadline_secs == 0 {
            return Err(ConfigValidationError::ZeroValue("cli.shutdown_deadline_secs"));
        }
        if self.cli.shutdown_grace_ms >= self.cli.shutdown_deadline_secs.saturating_mul(1000) {
            return Err(ConfigValidationError::GraceExceedsDeadline);
        }
        if self.anthropic.max_tokens == 0 {
            return Err(ConfigValidationError::ZeroValue("anthropic.max_tokens"));
        }

        Ok(())
    }
}
