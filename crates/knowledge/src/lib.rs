//! Document retrieval for docrag.
//!
//! A build loads the documents folder, chunks each document, embeds the
//! chunks and persists them as a LanceDB table plus a parallel chunk list.
//! A query embeds the question with the model the index was built with,
//! looks up the nearest chunks and optionally asks a language model to
//! answer from them.

pub mod chunk;
pub mod embeddings;
pub mod flat_index;
pub mod lancedb_index;
pub mod loader;
pub mod progress;
pub mod rag;
pub mod store;
pub mod vector_index;

pub use chunk::{ChunkMode, Chunker, ChunkingConfig, LlmHandle};
pub use docrag_core::config::DEFAULT_TOP_K;
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use loader::{load_documents, Document, DocumentKind};
pub use progress::{BuildPhase, ProgressEvent, ProgressReporter};
pub use rag::{AnswerGenerator, QueryResponse, RetrievedChunk, Retriever};
pub use store::{save_index, BuildManifest, ChunkStore, IndexedCorpus};

use docrag_core::{AppConfig, AppError, AppResult};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Inputs of one index build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub documents_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,

    /// Embedding batches in flight at once
    pub concurrency: usize,
}

impl BuildOptions {
    /// Options from the application config: its folders, chunking defaults
    /// and embedding model.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            documents_dir: config.documents_dir(),
            index_dir: config.index_dir(),
            chunking: ChunkingConfig::from_settings(&config.chunking),
            embedding: EmbeddingConfig::from_app_config(config),
            concurrency: config.embedding.concurrency,
        }
    }
}

/// Statistics from a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub embeddings: usize,
    pub elapsed_secs: f64,
}

/// Build the index: load, chunk, embed, persist.
///
/// `cancel` is checked between documents and between embedding batches. A
/// cancelled build returns `AppError::Cancelled` and leaves any previous
/// index untouched.
pub async fn build(
    options: &BuildOptions,
    chunker: &Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> AppResult<BuildStats> {
    let start = Instant::now();
    options.chunking.validate()?;

    tracing::info!(
        "Building index from {} (mode={}, chunk_size={}, overlap={})",
        options.documents_dir.display(),
        options.chunking.mode,
        options.chunking.chunk_size,
        options.chunking.overlap
    );

    let documents = load_documents(&options.documents_dir)?;
    reporter.load(
        documents.len() as u64,
        &options.documents_dir.display().to_string(),
    );

    let mut chunks = Vec::new();
    for (i, doc) in documents.iter().enumerate() {
        check_cancelled(cancel)?;

        let doc_chunks = chunker.chunk(&doc.text, &options.chunking).await?;
        tracing::debug!("{}: {} chunks", doc.path.display(), doc_chunks.len());
        chunks.extend(doc_chunks);

        reporter.chunk((i + 1) as u64, documents.len() as u64, chunks.len());
    }

    // Whitespace-only windows carry nothing to embed.
    let before = chunks.len();
    chunks.retain(|c| !c.trim().is_empty());
    if chunks.len() < before {
        tracing::debug!("Dropped {} blank chunks", before - chunks.len());
    }

    let embeddings = embed_chunks(&chunks, embedder.as_ref(), options, reporter, cancel).await?;
    check_cancelled(cancel)?;

    let manifest = BuildManifest::new(
        options.chunking.clone(),
        EmbeddingConfig {
            provider: embedder.provider_name().to_string(),
            model: embedder.model_name().to_string(),
            dimensions: embedder.dimensions(),
            ..options.embedding.clone()
        },
        documents.len(),
        chunks.len(),
    );

    reporter.index(chunks.len() as u64);
    save_index(
        &options.index_dir,
        &embeddings,
        &ChunkStore::new(chunks),
        &manifest,
    )
    .await?;

    let stats = BuildStats {
        documents: documents.len(),
        chunks: manifest.chunks,
        embeddings: embeddings.len(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    tracing::info!(
        "Build complete: {} documents, {} chunks in {:.2}s",
        stats.documents,
        stats.chunks,
        stats.elapsed_secs
    );
    Ok(stats)
}

/// Embed chunks in batches with bounded concurrency, preserving order.
async fn embed_chunks(
    chunks: &[String],
    embedder: &dyn EmbeddingProvider,
    options: &BuildOptions,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> AppResult<Vec<Vec<f32>>> {
    let batch_size = options.embedding.batch_size.max(1);
    let concurrency = options.concurrency.max(1);
    let total = chunks.len() as u64;
    let dimensions = embedder.dimensions();

    let mut batches = stream::iter(chunks.chunks(batch_size))
        .map(|batch| embedder.embed_batch(batch))
        .buffered(concurrency);

    let mut embeddings = Vec::with_capacity(chunks.len());
    while let Some(result) = batches.next().await {
        check_cancelled(cancel)?;

        for vector in result? {
            if vector.len() != dimensions {
                return Err(AppError::Embedding(format!(
                    "{} returned a {}-dimension vector, expected {}",
                    embedder.provider_name(),
                    vector.len(),
                    dimensions
                )));
            }
            embeddings.push(vector);
        }
        reporter.embed(embeddings.len() as u64, total, embedder.model_name());
    }

    if embeddings.len() != chunks.len() {
        return Err(AppError::Embedding(format!(
            "{} embeddings returned for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }
    Ok(embeddings)
}

fn check_cancelled(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        tracing::warn!("Build cancelled; index left unchanged");
        return Err(AppError::Cancelled);
    }
    Ok(())
}

/// Open the index at `index_dir` with a retriever that embeds queries using
/// the model recorded in its manifest.
pub async fn open_retriever(index_dir: &Path, api_key: Option<&str>) -> AppResult<Retriever> {
    let corpus = IndexedCorpus::open(index_dir).await?;
    let embedder = create_provider(&corpus.manifest().embedding, api_key)?;

    tracing::debug!(
        "Opened index: {} chunks, embedder {}/{}",
        corpus.chunks().len(),
        embedder.provider_name(),
        embedder.model_name()
    );
    Ok(Retriever::new(embedder, corpus))
}

/// Retrieve the `top_k` nearest chunks for `question` and, when a generator
/// is given, answer from them.
pub async fn query(
    retriever: &Retriever,
    generator: Option<&AnswerGenerator>,
    question: &str,
    top_k: usize,
) -> AppResult<QueryResponse> {
    let chunks = retriever.retrieve_scored(question, top_k).await?;

    let answer = match generator {
        Some(generator) => {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            Some(generator.generate(question, &texts).await?)
        }
        None => None,
    };

    Ok(QueryResponse {
        question: question.to_string(),
        answer,
        chunks,
    })
}

/// A chunker wired to the services `mode` can use.
///
/// Semantic mode gets `embedder`; agentic mode gets the configured
/// generation model. When that model cannot be set up the chunker runs
/// agentic mode on its fallbacks.
pub fn chunker_for(
    config: &AppConfig,
    mode: ChunkMode,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Chunker {
    match mode {
        ChunkMode::Semantic => Chunker::new().with_embedder(embedder),
        ChunkMode::Agentic => {
            let handle = docrag_llm::client_from_config(config)
                .and_then(|client| LlmHandle::new(client, &config.model, &config.workspace));
            match handle {
                Ok(handle) => Chunker::new().with_llm(handle),
                Err(e) => {
                    tracing::warn!(
                        "Language model unavailable for agentic chunking ({}); using sentence fallback",
                        e
                    );
                    Chunker::new()
                }
            }
        }
        ChunkMode::Fixed | ChunkMode::Recursive => Chunker::new(),
    }
}
