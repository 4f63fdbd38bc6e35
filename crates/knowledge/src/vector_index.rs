//! Vector index abstraction.
//!
//! An index holds one embedding per chunk, addressed by the chunk's position
//! in the persisted chunk list, and answers nearest-neighbour queries.

use docrag_core::AppResult;

/// One search hit: a chunk position and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embedding dimensions this index accepts.
    fn dimensions(&self) -> usize;

    /// Replace the index contents; `embeddings[i]` gets position `i`.
    async fn build(&mut self, embeddings: &[Vec<f32>]) -> AppResult<()>;

    /// The `k` nearest positions, ordered by ascending distance.
    async fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<Neighbor>>;

    /// Number of indexed vectors.
    async fn len(&self) -> AppResult<usize>;

    async fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Squared Euclidean distance.
pub(crate) fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
