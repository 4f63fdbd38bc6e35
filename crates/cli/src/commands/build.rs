//! Build command handler.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};
use docrag_knowledge::{chunker_for, BuildOptions, ProgressEvent, ProgressReporter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{configured_embedder, print_json};

/// Load, chunk, embed and index the documents folder
#[derive(Args, Debug, Default)]
pub struct BuildCommand {
    /// Documents folder (default: `paths.documents` from the config)
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Chunking mode (fixed, semantic, recursive, agentic)
    #[arg(long)]
    pub mode: Option<String>,

    /// Target chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by adjacent chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Embedding batches in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig, cancel: &CancellationToken) -> AppResult<()> {
        tracing::info!("Executing build command");
        tracing::debug!("Build options: {:?}", self);

        let config = config
            .clone()
            .with_chunking(self.chunk_size, self.overlap, self.mode.clone());
        config.chunking.validate()?;

        let mut options = BuildOptions::from_app_config(&config);
        if let Some(ref docs) = self.docs {
            options.documents_dir = docs.clone();
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }

        let embedder = configured_embedder(&config)?;
        let chunker = chunker_for(&config, options.chunking.mode, embedder.clone());

        let reporter = if self.json {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple())
            }))
        };

        let stats =
            docrag_knowledge::build(&options, &chunker, embedder, &reporter, cancel).await?;

        if self.json {
            print_json(&serde_json::json!({
                "documents": stats.documents,
                "chunks": stats.chunks,
                "embeddings": stats.embeddings,
                "elapsedSecs": stats.elapsed_secs,
                "mode": options.chunking.mode,
                "index": options.index_dir,
            }))?;
        } else {
            println!(
                "Indexed {} documents ({} chunks, mode={}) in {:.2}s",
                stats.documents, stats.chunks, options.chunking.mode, stats.elapsed_secs
            );
            println!("Index: {}", options.index_dir.display());
        }

        Ok(())
    }
}
