//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for memvault
#[derive(Parser, Debug)]
#[command(name = "memvault")]
#[command(author, version, about = "Completion provider for the memvault memory service")]
#[command(long_about = r#"
memvault keeps one completion CLI process warm and reuses it for every
extraction or reflection prompt, or sends each prompt to the remote API.

Configuration files are loaded from (in priority order):
1. MEMVAULT_* environment variables (e.g. MEMVAULT_CLI__MODEL=haiku)
2. --config <path>                  Explicit config file
3. ./memvault.toml                  Project-level config
4. ~/.config/memvault/config.toml   Global config

Example:
  memvault complete "Extract the people mentioned: Ana met Bo in Lisbon"
  memvault complete --system "Answer in one word" "Capital of France?"
  cat prompts.txt | memvault complete --stdin --stats
  memvault --mode remote info
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Override the completion mode (persistent, remote)
    #[arg(long, value_name = "MODE", global = true)]
    pub mode: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one or more completions and print each response
    Complete {
        /// Prompts to complete, in order
        prompts: Vec<String>,

        /// System prompt prepended to every prompt
        #[arg(short, long, value_name = "TEXT")]
        system: Option<String>,

        /// Also read prompts from stdin, one per line
        #[arg(long)]
        stdin: bool,

        /// Submit all prompts at once instead of one after another
        #[arg(long)]
        concurrent: bool,

        /// Print completion statistics to stderr when done
        #[arg(long)]
        stats: bool,
    },

    /// Print provider information as JSON
    Info {
        /// Start the provider before reporting
        #[arg(long)]
        init: bool,
    },

    /// Show configuration sources and the effective configuration
    Config,
}
