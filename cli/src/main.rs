//! CLI entrypoint for memvault
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;

use anyhow::{Context, Result, anyhow, bail};
use args::{Cli, Command};
use clap::Parser;
use memvault_application::{CompletionBackend, CompletionService};
use memvault_domain::CompletionMode;
use memvault_infrastructure::{
    AnthropicBackend, ConfigLoader, FileConfig, JsonlConversationLogger, PersistentCliBackend,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level; RUST_LOG wins when set
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    config.validate().context("Invalid configuration")?;

    let mode = match &cli.mode {
        Some(mode) => mode.parse::<CompletionMode>()?,
        None => config.completion.parse_mode()?,
    };

    if let Command::Config = cli.command {
        return show_config(&cli, &config, mode);
    }

    // === Dependency Injection ===
    let service = Arc::new(build_service(&config, mode)?);
    info!("Starting memvault completion provider ({})", mode);

    let outcome = match cli.command {
        Command::Complete {
            prompts,
            system,
            stdin,
            concurrent,
            stats,
        } => {
            let result = run_complete(&service, prompts, system, stdin, concurrent).await;
            if stats {
                let snapshot = service.stats();
                eprintln!(
                    "completions: {}  errors: {}  avg latency: {} ms",
                    snapshot.completions,
                    snapshot.errors,
                    snapshot.average_latency_ms()
                );
            }
            result
        }
        Command::Info { init } => run_info(&service, init).await,
        Command::Config => Ok(()),
    };

    // The provider is always stopped before exit, whatever happened above.
    if let Err(e) = service.shutdown().await {
        warn!("Provider shutdown failed: {}", e);
    }

    outcome
}

fn build_service(config: &FileConfig, mode: CompletionMode) -> Result<CompletionService> {
    let backend: Arc<dyn CompletionBackend> = match mode {
        CompletionMode::Persistent => Arc::new(PersistentCliBackend::new(
            config.cli.to_subprocess_config(),
        )),
        CompletionMode::Remote => Arc::new(AnthropicBackend::new(
            config.anthropic.to_remote_config(config.cli.turn_timeout()),
        )?),
    };

    let mut service = CompletionService::new(backend);
    if let Some(path) = &config.logging.conversation_log {
        match JsonlConversationLogger::open(path) {
            Some(logger) => {
                info!("Conversation log: {}", logger.path().display());
                service = service.with_conversation_logger(Arc::new(logger));
            }
            None => warn!("Continuing without conversation log"),
        }
    }
    Ok(service)
}

async fn run_complete(
    service: &Arc<CompletionService>,
    mut prompts: Vec<String>,
    system: Option<String>,
    read_stdin: bool,
    concurrent: bool,
) -> Result<()> {
    if read_stdin {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() {
                prompts.push(line);
            }
        }
    }
    if prompts.is_empty() {
        bail!("No prompt given. Pass prompts as arguments or use --stdin.");
    }

    let total = prompts.len();
    let mut failed = 0;

    if concurrent {
        let system: Option<Arc<str>> = system.map(Arc::from);
        let mut tasks = JoinSet::new();
        for (index, prompt) in prompts.into_iter().enumerate() {
            let service = Arc::clone(service);
            let system = system.clone();
            tasks.spawn(async move {
                let result = service.complete(&prompt, system.as_deref()).await;
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            results.push(joined?);
        }
        results.sort_by_key(|(index, _)| *index);

        for (_, result) in results {
            if !print_result(result) {
                failed += 1;
            }
        }
    } else {
        for prompt in &prompts {
            let result = service.complete(prompt, system.as_deref()).await;
            if !print_result(result) {
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} completions failed", failed, total);
    }
    Ok(())
}

fn print_result<E: std::fmt::Display>(result: std::result::Result<String, E>) -> bool {
    match result {
        Ok(text) => {
            println!("{}", text);
            true
        }
        Err(e) => {
            eprintln!("error: {}", e);
            false
        }
    }
}

async fn run_info(service: &CompletionService, init: bool) -> Result<()> {
    if init {
        service.initialize().await?;
    }
    println!("{}", serde_json::to_string_pretty(&service.info())?);
    Ok(())
}

fn show_config(cli: &Cli, config: &FileConfig, mode: CompletionMode) -> Result<()> {
    if cli.no_config {
        println!("Configuration files disabled (--no-config)");
    } else {
        println!("Configuration sources (in priority order):");
        for source in ConfigLoader::sources(cli.config.as_ref()) {
            let marker = if source.found { "FOUND" } else { "     " };
            println!("  [{}] {:<8} {}", marker, format!("{}:", source.label), source.location);
        }
    }
    println!();
    println!("Active mode: {} ({})", mode, mode.short_description());
    println!();

    let mut shown = config.clone();
    if shown.anthropic.api_key.is_some() {
        shown.anthropic.api_key = Some("********".to_string());
    }
    print!(
        "{}",
        toml::to_string_pretty(&shown).context("Failed to render configuration")?
    );
    Ok(())
}
