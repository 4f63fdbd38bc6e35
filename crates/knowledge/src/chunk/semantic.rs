//! Embedding-guided sentence grouping.
//!
//! Sentences are embedded and a boundary is placed after every sentence whose
//! cosine distance to the next one exceeds the 95th percentile of all
//! adjacent distances. Groups that come out longer than 1.5x the chunk size
//! are re-cut with the fixed splitter.

use super::fixed::split_fixed;
use super::sentences::split_sentences;
use super::{char_len, ChunkStrategy, ChunkingConfig};
use crate::embeddings::EmbeddingProvider;
use docrag_core::AppResult;
use std::sync::Arc;
use tracing::{debug, warn};

const BREAKPOINT_PERCENTILE: f64 = 95.0;
const SUBSPLIT_OVERLAP: usize = 50;

pub struct SemanticChunker {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl SemanticChunker {
    pub fn new(embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { embedder }
    }

    /// One vector per sentence plus the number of sentences that fell back to
    /// the zero vector. A single bad sentence only turns its neighbours into
    /// boundaries.
    async fn embed_sentences(&self, sentences: &[String]) -> (Vec<Vec<f32>>, usize) {
        let Some(embedder) = &self.embedder else {
            debug!("No embedder configured, every sentence pair is maximally distant");
            return (vec![Vec::new(); sentences.len()], sentences.len());
        };
        let zero = vec![0.0; embedder.dimensions()];

        let vectors = match embedder.embed_batch(sentences).await {
            Ok(vectors) if vectors.len() == sentences.len() => vectors,
            Ok(vectors) => {
                warn!(
                    "Embedder returned {} vectors for {} sentences, embedding one at a time",
                    vectors.len(),
                    sentences.len()
                );
                self.embed_each(embedder.as_ref(), sentences).await
            }
            Err(e) => {
                warn!("Batch sentence embedding failed ({}), embedding one at a time", e);
                self.embed_each(embedder.as_ref(), sentences).await
            }
        };

        let mut degraded = 0;
        let vectors = vectors
            .into_iter()
            .map(|v| {
                if v.is_empty() {
                    degraded += 1;
                    zero.clone()
                } else {
                    v
                }
            })
            .collect();
        (vectors, degraded)
    }

    async fn embed_each(
        &self,
        embedder: &dyn EmbeddingProvider,
        sentences: &[String],
    ) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(sentences.len());
        for (i, sentence) in sentences.iter().enumerate() {
            match embedder.embed(sentence).await {
                Ok(v) => vectors.push(v),
                Err(e) => {
                    warn!("Embedding sentence {} failed, using zero vector: {}", i, e);
                    vectors.push(Vec::new());
                }
            }
        }
        vectors
    }
}

#[async_trait::async_trait]
impl ChunkStrategy for SemanticChunker {
    async fn chunk(&self, text: &str, config: &ChunkingConfig) -> AppResult<Vec<String>> {
        let sentences = split_sentences(text);
        if sentences.len() <= 1 {
            return Ok(vec![text.to_string()]);
        }

        let (embeddings, degraded) = self.embed_sentences(&sentences).await;
        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| cosine_distance(&pair[0], &pair[1]))
            .collect();

        let breakpoints = breakpoints(&distances);
        debug!(
            sentences = sentences.len(),
            breakpoints = breakpoints.len(),
            degraded,
            "Semantic boundaries"
        );

        let mut chunks = Vec::new();
        let mut start = 0;
        for bp in breakpoints {
            push_group(&mut chunks, &sentences[start..=bp], config.chunk_size);
            start = bp + 1;
        }
        if start < sentences.len() {
            push_group(&mut chunks, &sentences[start..], config.chunk_size);
        }

        chunks.retain(|c| !c.trim().is_empty());
        Ok(chunks)
    }
}

/// Join a sentence group, re-cutting it when it exceeds 1.5x `chunk_size`.
fn push_group(chunks: &mut Vec<String>, group: &[String], chunk_size: usize) {
    let joined = group.join(" ");
    if char_len(&joined) * 2 > chunk_size * 3 {
        let overlap = SUBSPLIT_OVERLAP.min(chunk_size.saturating_sub(1));
        chunks.extend(split_fixed(&joined, chunk_size, overlap));
    } else {
        chunks.push(joined);
    }
}

/// Indices `i` where the distance between sentence `i` and `i + 1` is
/// strictly above the 95th percentile.
fn breakpoints(distances: &[f64]) -> Vec<usize> {
    let Some(threshold) = percentile(distances, BREAKPOINT_PERCENTILE) else {
        return Vec::new();
    };
    distances
        .iter()
        .enumerate()
        .filter(|(_, d)| **d > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// `1 - cosine similarity`. Zero-norm or mismatched vectors have similarity 0.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Percentile with linear interpolation between closest ranks.
pub(crate) fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMode;
    use crate::embeddings::providers::TrigramProvider;
    use docrag_core::AppError;

    /// Maps sentences to fixed vectors by their first word.
    #[derive(Debug)]
    struct TopicEmbedder {
        fail_batch: bool,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        fn provider_name(&self) -> &str {
            "topic"
        }
        fn model_name(&self) -> &str {
            "topic-v1"
        }
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            if self.fail_batch && texts.len() > 1 {
                return Err(AppError::Embedding("batch endpoint down".to_string()));
            }
            texts
                .iter()
                .map(|t| match t.split_whitespace().next() {
                    Some("Cats") => Ok(vec![1.0, 0.0]),
                    Some("Stocks") => Ok(vec![0.0, 1.0]),
                    Some("Broken") => Err(AppError::Embedding("refused".to_string())),
                    _ => Ok(vec![0.7, 0.7]),
                })
                .collect()
        }
    }

    fn config(chunk_size: usize) -> ChunkingConfig {
        ChunkingConfig::new(chunk_size, 10, ChunkMode::Semantic)
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[], 95.0), None);
        assert_eq!(percentile(&[0.4], 95.0), Some(0.4));
        let p = percentile(&[0.0, 1.0], 95.0).unwrap();
        assert!((p - 0.95).abs() < 1e-9);
        let p = percentile(&[3.0, 1.0, 2.0], 50.0).unwrap();
        assert!((p - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[], &[]), 1.0);
    }

    #[test]
    fn test_breakpoints_above_percentile_only() {
        assert!(breakpoints(&[0.3]).is_empty());
        assert!(breakpoints(&[0.2, 0.2, 0.2]).is_empty());
        assert_eq!(breakpoints(&[0.1, 0.9, 0.1]), vec![1]);
    }

    #[tokio::test]
    async fn test_single_sentence_is_returned_whole() {
        let chunker = SemanticChunker::new(None);
        let chunks = chunker.chunk("Just one sentence here", &config(100)).await.unwrap();
        assert_eq!(chunks, vec!["Just one sentence here"]);
    }

    #[tokio::test]
    async fn test_two_sentences_form_one_chunk() {
        let chunker = SemanticChunker::new(Some(Arc::new(TrigramProvider::new(64))));
        let chunks = chunker
            .chunk("Rust has ownership. Python has a garbage collector.", &config(200))
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Rust has ownership. Python has a garbage collector."]);
    }

    #[tokio::test]
    async fn test_topic_shift_splits() {
        let chunker = SemanticChunker::new(Some(Arc::new(TopicEmbedder { fail_batch: false })));
        let text = "Cats purr softly. Cats sleep a lot. Stocks fell today. Stocks may recover.";
        let chunks = chunker.chunk(text, &config(500)).await.unwrap();
        assert_eq!(
            chunks,
            vec!["Cats purr softly. Cats sleep a lot.", "Stocks fell today. Stocks may recover."]
        );
    }

    #[tokio::test]
    async fn test_three_sentences_split_at_the_larger_distance() {
        let chunker = SemanticChunker::new(Some(Arc::new(TopicEmbedder { fail_batch: false })));

        // distances [0, 1]: the threshold interpolates to 0.95, so only the second pair splits
        let chunks = chunker
            .chunk("Cats a. Cats b. Stocks c.", &config(500))
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Cats a. Cats b.", "Stocks c."]);

        // distances [1, 0]: same threshold, the split moves to the first pair
        let chunks = chunker
            .chunk("Cats a. Stocks b. Stocks c.", &config(500))
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Cats a.", "Stocks b. Stocks c."]);
    }

    #[tokio::test]
    async fn test_three_sentences_with_equal_distances_stay_together() {
        let chunker = SemanticChunker::new(Some(Arc::new(TopicEmbedder { fail_batch: false })));
        let chunks = chunker
            .chunk("Cats a. Cats b. Cats c.", &config(500))
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Cats a. Cats b. Cats c."]);
    }

    #[tokio::test]
    async fn test_oversized_group_is_recut() {
        let chunker = SemanticChunker::new(Some(Arc::new(TopicEmbedder { fail_batch: false })));
        let text = "Cats purr. Cats nap. Cats eat. Cats play. Cats hide.";
        let chunks = chunker.chunk(text, &config(10)).await.unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks[0], "Cats purr.");
    }

    #[tokio::test]
    async fn test_failed_embeddings_degrade_instead_of_erroring() {
        let chunker = SemanticChunker::new(Some(Arc::new(TopicEmbedder { fail_batch: true })));
        let text = "Cats purr. Broken sentence here. Cats nap.";
        let chunks = chunker.chunk(text, &config(500)).await.unwrap();
        assert!(!chunks.is_empty());
        let rejoined = chunks.join(" ");
        assert!(rejoined.contains("Broken sentence here."));
        assert!(rejoined.contains("Cats nap."));
    }

    #[tokio::test]
    async fn test_no_embedder_still_covers_every_sentence() {
        let chunker = SemanticChunker::new(None);
        let text = "First point. Second point. Third point.";
        let chunks = chunker.chunk(text, &config(500)).await.unwrap();
        assert_eq!(chunks.join(" "), text);
    }
}
