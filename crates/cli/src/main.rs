//! Grounded CLI
//!
//! Main entry point for the `grounded` command-line tool.
//! Answers questions strictly from a local knowledge base, with citations.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, InteractionsCommand, KnowledgeCommand};
use grounded_core::{config::AppConfig, logging, AppError, AppResult, LogFormat};
use std::path::PathBuf;

/// Grounded - answers from your knowledge base, or "I don't know"
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Grounded question answering over a local knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "GROUNDED_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true, env = "GROUNDED_LOG_FORMAT")]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama)
    #[arg(short, long, global = true, env = "GROUNDED_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "GROUNDED_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question against a knowledge base
    Ask(AskCommand),

    /// Knowledge base management (local index)
    Knowledge(KnowledgeCommand),

    /// Browse recorded interactions
    Interactions(InteractionsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let log_format = cli
        .log_format
        .as_deref()
        .map(|raw| {
            LogFormat::parse(raw)
                .ok_or_else(|| AppError::Config(format!("Unknown log format: {}", raw)))
        })
        .transpose()?;

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        log_format,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}, model: {}", config.provider, config.model);

    config.validate()?;
    config.ensure_grounded_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Knowledge(_) => "knowledge",
        Commands::Interactions(_) => "interactions",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Knowledge(cmd) => cmd.execute(&config).await,
        Commands::Interactions(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
