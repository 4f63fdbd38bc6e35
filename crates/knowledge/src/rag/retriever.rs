//! Query embedding plus nearest-neighbour lookup.

use crate::embeddings::EmbeddingProvider;
use crate::rag::types::RetrievedChunk;
use crate::store::IndexedCorpus;
use docrag_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Turns a query string into the closest chunks of an indexed corpus.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    corpus: IndexedCorpus,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, corpus: IndexedCorpus) -> Self {
        Self { embedder, corpus }
    }

    pub fn corpus(&self) -> &IndexedCorpus {
        &self.corpus
    }

    /// Chunk texts nearest to `query`, closest first.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<String>> {
        Ok(self
            .retrieve_scored(query, top_k)
            .await?
            .into_iter()
            .map(|c| c.text)
            .collect())
    }

    /// Like [`Retriever::retrieve`], keeping positions and distances.
    #[instrument(skip(self, query))]
    pub async fn retrieve_scored(
        &self,
        query: &str,
        top_k: usize,
    ) -> AppResult<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(AppError::Retrieval("Query is empty".to_string()));
        }
        if top_k == 0 {
            return Err(AppError::Retrieval(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.corpus.is_empty() {
            return Err(AppError::Retrieval(
                "Index is empty; build it from documents first".to_string(),
            ));
        }

        let query_vec = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to embed query: {}", e)))?;
        if query_vec.is_empty() {
            return Err(AppError::Retrieval(
                "Query produced no embedding".to_string(),
            ));
        }
        if query_vec.len() != self.corpus.dimensions() {
            return Err(AppError::Retrieval(format!(
                "Query embedding has {} dimensions but the index was built with {}",
                query_vec.len(),
                self.corpus.dimensions()
            )));
        }

        let hits = self.corpus.search(&query_vec, top_k).await?;
        debug!(
            hits = hits.len(),
            closest = hits.first().map(|h| h.distance),
            "Retrieved chunks"
        );

        Ok(hits
            .into_iter()
            .map(|h| RetrievedChunk {
                position: h.position,
                distance: h.distance,
                text: h.text,
            })
            .collect())
    }
}
