//! Backend selection from TOML (`[completion]` section)

use super::ConfigValidationError;
use memvault_domain::CompletionMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCompletionConfig {
    /// "persistent" (local CLI subprocess) or "remote" (HTTP API)
    pub mode: String,
}

impl Default for FileCompletionConfig {
    fn default() -> Self {
        Self {
            mode: CompletionMode::default().to_string(),
        }
    }
}

impl FileCompletionConfig {
    pub fn parse_mode(&self) -> Result<CompletionMode, ConfigValidationError> {
        self.mode
            .parse()
            .map_err(|_| ConfigValidationError::InvalidMode(self.mode.clone()))
    }
}
