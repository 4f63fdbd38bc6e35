//! docrag CLI
//!
//! Builds a vector index from a folder of documents and answers questions
//! from it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, ChunkCommand, InteractiveCommand, QueryCommand, StatsCommand};
use docrag_core::{config::AppConfig, logging, AppError, AppResult};
use std::future::Future;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// docrag - retrieval-augmented answers over a folder of documents
#[derive(Parser, Debug)]
#[command(name = "docrag")]
#[command(about = "Chunk, index and query local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider for answers and agentic chunking (ollama, openai)
    #[arg(short, long, global = true, env = "DOCRAG_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "DOCRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load, chunk, embed and index the documents folder
    Build(BuildCommand),

    /// Retrieve relevant chunks and answer a question
    Query(QueryCommand),

    /// Print the chunks of a single file
    Chunk(ChunkCommand),

    /// Show how the current index was built
    Stats(StatsCommand),

    /// Choose build or query from a prompt
    Interactive(InteractiveCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    config.validate()?;
    config.ensure_dirs()?;
    let log_file = config.log_file_path();
    logging::init_logging(config.log_level.as_deref(), config.no_color, log_file.as_deref())?;

    tracing::info!("docrag starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}, model: {}", config.provider, config.model);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Query(_) => "query",
        Commands::Chunk(_) => "chunk",
        Commands::Stats(_) => "stats",
        Commands::Interactive(_) => "interactive",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Build(cmd) => cmd.execute(&config, &cancel).await,
            Commands::Query(cmd) => until_cancelled(&cancel, cmd.execute(&config)).await,
            Commands::Chunk(cmd) => until_cancelled(&cancel, cmd.execute(&config)).await,
            Commands::Stats(cmd) => until_cancelled(&cancel, cmd.execute(&config)).await,
            Commands::Interactive(cmd) => cmd.execute(&config, &cancel).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

/// Drive `command` until it finishes or the interrupt handler fires. Build
/// and interactive check the token themselves; everything else is dropped
/// mid-flight, which aborts any outstanding request.
async fn until_cancelled<F>(cancel: &CancellationToken, command: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    tokio::select! {
        result = command => result,
        _ = cancel.cancelled() => Err(AppError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interrupt_stops_a_stalled_command() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = until_cancelled(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_command_result_passes_through() {
        let cancel = CancellationToken::new();
        assert!(until_cancelled(&cancel, async { Ok(()) }).await.is_ok());

        let result = until_cancelled(&cancel, async {
            Err(AppError::Retrieval("no index".to_string()))
        })
        .await;
        assert!(matches!(result, Err(AppError::Retrieval(_))));
    }

    #[test]
    fn test_cli_parses_query() {
        let cli = Cli::try_parse_from(["docrag", "query", "what is ownership?", "-k", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Query(_)));
    }
}
