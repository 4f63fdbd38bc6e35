//! Stats command handler.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};
use docrag_knowledge::BuildManifest;

use super::print_json;

/// Show how the current index was built
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let index_dir = config.index_dir();
        let manifest = BuildManifest::load(&index_dir)?;

        if self.json {
            return print_json(&manifest);
        }

        println!("Index: {}", index_dir.display());
        println!("  Built: {} (build {})", manifest.built_at.to_rfc3339(), manifest.build_id);
        println!("  Documents: {}", manifest.documents);
        println!("  Chunks: {}", manifest.chunks);
        println!(
            "  Chunking: mode={}, chunk_size={}, overlap={}",
            manifest.chunking.mode, manifest.chunking.chunk_size, manifest.chunking.overlap
        );
        println!(
            "  Embedding: {}/{} ({} dimensions)",
            manifest.embedding.provider, manifest.embedding.model, manifest.embedding.dimensions
        );

        Ok(())
    }
}
