//! Launch and timing configuration for the completion CLI subprocess

use super::shutdown::ShutdownPlan;
use std::time::Duration;

/// Default executable name
pub const DEFAULT_COMMAND: &str = "claude";

/// Default arguments putting the CLI into line-delimited JSON mode
pub const DEFAULT_ARGS: &[&str] = &[
    "-p",
    "--input-format",
    "stream-json",
    "--output-format",
    "stream-json",
    "--verbose",
];

/// Prompt sent once after spawning to confirm the CLI is answering
pub const DEFAULT_WARMUP_PROMPT: &str = "Reply with the single word: ready";

/// How to launch and drive the completion CLI
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Executable to run
    pub command: String,
    /// Arguments passed before any `--model` flag
    pub args: Vec<String>,
    /// Model to request; appended as `--model <model>`
    pub model: Option<String>,
    /// Text of the warmup turn
    pub warmup_prompt: String,
    /// Maximum time a single turn may stay open
    pub turn_timeout: Duration,
    /// How long initialization waits on the warmup before reporting ready
    pub warmup_grace: Duration,
    /// Escalation timings for shutdown
    pub shutdown: ShutdownPlan,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
            model: None,
            warmup_prompt: DEFAULT_WARMUP_PROMPT.to_string(),
            turn_timeout: Duration::from_secs(120),
            warmup_grace: Duration::from_secs(10),
            shutdown: ShutdownPlan::default(),
        }
    }
}

impl SubprocessConfig {
    /// Run `command` with `args` and default timings.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_warmup_grace(mut self, grace: Duration) -> Self {
        self.warmup_grace = grace;
        self
    }

    pub fn with_shutdown(mut self, plan: ShutdownPlan) -> Self {
        self.shutdown = plan;
        self
    }

    /// Full argument list, including the model flag.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(model) = self.model.as_deref().filter(|m| !m.is_empty()) {
            args.push("--model".to_string());
            args.push(model.to_string());
        }
        args
    }
}
