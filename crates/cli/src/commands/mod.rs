//! Command handlers for the docrag CLI.

pub mod build;
pub mod chunk;
pub mod interactive;
pub mod query;
pub mod stats;

pub use build::BuildCommand;
pub use chunk::ChunkCommand;
pub use interactive::InteractiveCommand;
pub use query::QueryCommand;
pub use stats::StatsCommand;

use docrag_core::{config::AppConfig, AppError, AppResult};
use docrag_knowledge::{create_provider, EmbeddingConfig, EmbeddingProvider};
use std::sync::Arc;

/// The embedding provider named by the configuration.
pub(crate) fn configured_embedder(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let embedding = EmbeddingConfig::from_app_config(config);
    let api_key = config.resolve_api_key(&embedding.provider);
    create_provider(&embedding, api_key.as_deref())
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
