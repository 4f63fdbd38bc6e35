//! Chunk command handler.
//!
//! Runs the chunking engine over one file and prints the result, so the
//! effect of a mode or size can be inspected without building an index.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};
use docrag_knowledge::loader::load_file;
use docrag_knowledge::{chunker_for, ChunkingConfig};
use std::path::PathBuf;

use super::{configured_embedder, print_json};

/// Print the chunks of a single file
#[derive(Args, Debug)]
pub struct ChunkCommand {
    /// File to chunk (.txt, .md or .pdf)
    pub file: PathBuf,

    /// Chunking mode (fixed, semantic, recursive, agentic)
    #[arg(long)]
    pub mode: Option<String>,

    /// Target chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by adjacent chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunkCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chunk command for {}", self.file.display());

        let config = config
            .clone()
            .with_chunking(self.chunk_size, self.overlap, self.mode.clone());
        let chunking = ChunkingConfig::from_settings(&config.chunking);
        chunking.validate()?;

        let document = load_file(&self.file)?;
        let chunker = chunker_for(&config, chunking.mode, configured_embedder(&config)?);
        let chunks = chunker.chunk(&document.text, &chunking).await?;

        if self.json {
            return print_json(&serde_json::json!({
                "file": self.file,
                "mode": chunking.mode,
                "chunkSize": chunking.chunk_size,
                "overlap": chunking.overlap,
                "chunks": chunks,
            }));
        }

        for (i, chunk) in chunks.iter().enumerate() {
            println!("--- chunk {} ({} chars) ---", i, chunk.chars().count());
            println!("{}", chunk);
        }
        eprintln!(
            "{} chunks (mode={}, chunk_size={}, overlap={})",
            chunks.len(),
            chunking.mode,
            chunking.chunk_size,
            chunking.overlap
        );

        Ok(())
    }
}
