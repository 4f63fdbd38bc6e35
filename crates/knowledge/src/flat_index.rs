//! Exhaustive in-memory index.

use crate::vector_index::{squared_l2, Neighbor, VectorIndex};
use docrag_core::{AppError, AppResult};

/// Brute-force L2 search over vectors held in memory. Useful for small
/// corpora and for exercising retrieval without a database.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn build(&mut self, embeddings: &[Vec<f32>]) -> AppResult<()> {
        if let Some((i, v)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimensions)
        {
            return Err(AppError::Index(format!(
                "Embedding {} has {} dimensions, expected {}",
                i,
                v.len(),
                self.dimensions
            )));
        }
        self.vectors = embeddings.to_vec();
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<Neighbor>> {
        if query.len() != self.dimensions {
            return Err(AppError::Retrieval(format!(
                "Query embedding has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: squared_l2(query, v),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn len(&self) -> AppResult<usize> {
        Ok(self.vectors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let mut index = FlatIndex::new(2);
        index
            .build(&[vec![0.0, 0.0], vec![5.0, 5.0], vec![1.0, 0.0]])
            .await
            .unwrap();

        let hits = index.search(&[0.9, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 2);
        assert_eq!(hits[1].position, 0);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_k_larger_than_index() {
        let mut index = FlatIndex::new(1);
        index.build(&[vec![1.0]]).await.unwrap();
        assert_eq!(index.search(&[0.0], 10).await.unwrap().len(), 1);
        assert!(!index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_dimension_checks() {
        let mut index = FlatIndex::new(3);
        assert!(matches!(
            index.build(&[vec![1.0, 2.0]]).await,
            Err(AppError::Index(_))
        ));
        index.build(&[vec![1.0, 2.0, 3.0]]).await.unwrap();
        assert!(matches!(
            index.search(&[1.0], 1).await,
            Err(AppError::Retrieval(_))
        ));
    }

    #[tokio::test]
    async fn test_build_replaces_contents() {
        let mut index = FlatIndex::new(1);
        index.build(&[vec![1.0], vec![2.0]]).await.unwrap();
        index.build(&[vec![3.0]]).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
    }
}
