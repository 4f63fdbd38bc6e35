//! Embedding configuration types.

use docrag_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Which embedding model a build used, or a query should use.
///
/// Persisted in the build manifest so queries embed with the same model
/// the index was built with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "openai", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Service base URL; provider default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Maximum texts per request for providers with a batch API
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Derive the embedding config from the application config.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let settings = &config.embedding;
        let block = config.get_provider_config(&settings.provider);

        // The trigram embedder has a single model regardless of configuration.
        let model = if settings.provider == "trigram" {
            "trigram-v1".to_string()
        } else {
            settings.model.clone()
        };

        Self {
            provider: settings.provider.clone(),
            model,
            dimensions: settings.dimensions,
            endpoint: block.as_ref().and_then(|b| b.endpoint()).map(str::to_string),
            batch_size: default_batch_size(),
            timeout_secs: block
                .as_ref()
                .and_then(|b| b.timeout())
                .unwrap_or_else(default_timeout_secs),
        }
    }

    /// Validate that another config is consistent with this one.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Config(format!(
                "Provider mismatch: expected '{}', got '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Config(format!(
                "Model mismatch: expected '{}', got '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Config(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }
}
