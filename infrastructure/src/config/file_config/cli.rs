//! Persistent CLI configuration from TOML (`[cli]` section)

use crate::claude::config::{DEFAULT_ARGS, DEFAULT_COMMAND, DEFAULT_WARMUP_PROMPT, SubprocessConfig};
use crate::claude::shutdown::ShutdownPlan;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCliConfig {
    /// Executable to run (default: "claude")
    pub command: String,
    /// Arguments selecting line-delimited JSON mode
    pub args: Vec<String>,
    /// Model passed as `--model`
    pub model: Option<String>,
    /// Text of the warmup turn sent after each spawn
    pub warmup_prompt: String,
    /// Maximum seconds a single turn may take (default: 120)
    pub turn_timeout_secs: u64,
    /// Milliseconds to wait on the warmup before reporting ready (default: 10000)
    pub warmup_grace_ms: u64,
    /// Milliseconds between closing stdin and requesting termination (default: 500)
    pub shutdown_grace_ms: u64,
    /// Seconds from the start of shutdown until the process is killed (default: 5)
    pub shutdown_deadline_secs: u64,
}

impl Default for FileCliConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
            model: None,
            warmup_prompt: DEFAULT_WARMUP_PROMPT.to_string(),
            turn_timeout_secs: 120,
            warmup_grace_ms: 10_000,
            shutdown_grace_ms: 500,
            shutdown_deadline_secs: 5,
        }
    }
}

impl FileCliConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn to_subprocess_config(&self) -> SubprocessConfig {
        SubprocessConfig {
            command: self.command.clone(),
            args: self.args.clone(),
            model: self.model.clone(),
            warmup_prompt: self.warmup_prompt.clone(),
            turn_timeout: self.turn_timeout(),
            warmup_grace: Duration::from_millis(self.warmup_grace_ms),
            shutdown: ShutdownPlan {
                grace: Duration::from_millis(self.shutdown_grace_ms),
                hard_deadline: Duration::from_secs(self.shutdown_deadline_secs),
            },
        }
    }
}
