//! Chunking engine.
//!
//! Four strategies split a document into an ordered list of chunk strings:
//! - `fixed`: sliding character window
//! - `semantic`: sentence groups cut where adjacent embeddings diverge
//! - `recursive`: structural separators from paragraphs down to characters
//! - `agentic`: a language model rewrites the text as propositions and groups them
//!
//! Lengths are counted in `char`s. The embedding and language-model calls the
//! semantic and agentic strategies make are aids: when they fail the strategy
//! degrades to a deterministic fallback instead of failing the chunk call.

pub mod agentic;
pub mod fixed;
pub mod recursive;
pub mod semantic;
mod sentences;

pub use agentic::{AgenticChunker, LlmHandle};
pub use fixed::{split_fixed, FixedChunker};
pub use recursive::RecursiveChunker;
pub use semantic::SemanticChunker;
pub use sentences::split_sentences;

use crate::embeddings::EmbeddingProvider;
use docrag_core::config::{validate_chunking, ChunkingSettings};
use docrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Chunking strategy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    #[default]
    Fixed,
    Semantic,
    Recursive,
    Agentic,
}

impl ChunkMode {
    pub const ALL: [ChunkMode; 4] = [
        ChunkMode::Fixed,
        ChunkMode::Semantic,
        ChunkMode::Recursive,
        ChunkMode::Agentic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkMode::Fixed => "fixed",
            ChunkMode::Semantic => "semantic",
            ChunkMode::Recursive => "recursive",
            ChunkMode::Agentic => "agentic",
        }
    }

    /// Parse a mode name, falling back to `Fixed` for anything unrecognized.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown chunking mode '{}', using fixed", s);
            ChunkMode::Fixed
        })
    }
}

impl FromStr for ChunkMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(ChunkMode::Fixed),
            "semantic" => Ok(ChunkMode::Semantic),
            "recursive" => Ok(ChunkMode::Recursive),
            "agentic" => Ok(ChunkMode::Agentic),
            other => Err(AppError::Config(format!(
                "Unknown chunking mode '{}'. Supported: fixed, semantic, recursive, agentic",
                other
            ))),
        }
    }
}

impl fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size, overlap and strategy for one chunking call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks (fixed and recursive modes)
    pub overlap: usize,
    pub mode: ChunkMode,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
            mode: ChunkMode::Fixed,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize, mode: ChunkMode) -> Self {
        Self {
            chunk_size,
            overlap,
            mode,
        }
    }

    /// Build from the workspace settings; unknown mode names become `Fixed`.
    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self::new(
            settings.chunk_size,
            settings.overlap,
            ChunkMode::parse_lenient(&settings.mode),
        )
    }

    /// `chunk_size > 0` and `overlap < chunk_size`, otherwise `AppError::Config`.
    pub fn validate(&self) -> AppResult<()> {
        validate_chunking(self.chunk_size, self.overlap)
    }
}

/// One chunking strategy.
#[async_trait::async_trait]
pub trait ChunkStrategy: Send + Sync {
    /// Split non-blank `text`. The config has already been validated.
    async fn chunk(&self, text: &str, config: &ChunkingConfig) -> AppResult<Vec<String>>;
}

/// Dispatches chunking calls to the strategy named by the config.
pub struct Chunker {
    fixed: FixedChunker,
    recursive: RecursiveChunker,
    semantic: SemanticChunker,
    agentic: AgenticChunker,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker {
    /// A chunker with no external services; semantic and agentic modes run
    /// on their fallbacks.
    pub fn new() -> Self {
        Self {
            fixed: FixedChunker,
            recursive: RecursiveChunker,
            semantic: SemanticChunker::new(None),
            agentic: AgenticChunker::new(None),
        }
    }

    /// Use `embedder` for sentence embeddings in semantic mode.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.semantic = SemanticChunker::new(Some(embedder));
        self
    }

    /// Use a language model for propositions and grouping in agentic mode.
    pub fn with_llm(mut self, llm: LlmHandle) -> Self {
        self.agentic = AgenticChunker::new(Some(llm));
        self
    }

    fn strategy(&self, mode: ChunkMode) -> &dyn ChunkStrategy {
        match mode {
            ChunkMode::Fixed => &self.fixed,
            ChunkMode::Semantic => &self.semantic,
            ChunkMode::Recursive => &self.recursive,
            ChunkMode::Agentic => &self.agentic,
        }
    }

    /// Split one document. Blank text yields no chunks.
    pub async fn chunk(&self, text: &str, config: &ChunkingConfig) -> AppResult<Vec<String>> {
        config.validate()?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.strategy(config.mode).chunk(text, config).await?;

        tracing::debug!(
            mode = %config.mode,
            chunk_size = config.chunk_size,
            overlap = config.overlap,
            chars = text.chars().count(),
            chunks = chunks.len(),
            "Chunked document"
        );

        Ok(chunks)
    }

    /// Split every document in order and concatenate the results.
    pub async fn chunk_documents<S: AsRef<str>>(
        &self,
        docs: &[S],
        config: &ChunkingConfig,
    ) -> AppResult<Vec<String>> {
        config.validate()?;

        let mut all_chunks = Vec::new();
        for doc in docs {
            all_chunks.extend(self.chunk(doc.as_ref(), config).await?);
        }
        Ok(all_chunks)
    }
}

/// Chunk `text` without external services, parsing `mode` leniently.
pub async fn chunk(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    mode: &str,
) -> AppResult<Vec<String>> {
    let config = ChunkingConfig::new(chunk_size, overlap, ChunkMode::parse_lenient(mode));
    Chunker::new().chunk(text, &config).await
}

/// Chunk several documents without external services.
pub async fn chunk_documents<S: AsRef<str>>(
    docs: &[S],
    chunk_size: usize,
    overlap: usize,
    mode: &str,
) -> AppResult<Vec<String>> {
    let config = ChunkingConfig::new(chunk_size, overlap, ChunkMode::parse_lenient(mode));
    Chunker::new().chunk_documents(docs, &config).await
}

/// Character count, the unit every size limit is expressed in.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}
