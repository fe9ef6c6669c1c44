//! Configuration file loading for memvault
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `MEMVAULT_*` environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./memvault.toml` or `./.memvault.toml`
//! 4. Global: `$XDG_CONFIG_HOME/memvault/config.toml` (or the platform equivalent)
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileAnthropicConfig, FileCliConfig, FileCompletionConfig, FileConfig,
    FileLoggingConfig,
};
pub use loader::{ConfigLoader, ConfigSource};
