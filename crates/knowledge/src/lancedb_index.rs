//! LanceDB-backed vector index.

use crate::vector_index::{Neighbor, VectorIndex};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use docrag_core::{AppError, AppResult};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;
use std::path::Path;
use std::sync::Arc;

/// Table holding one `(position, embedding)` row per chunk.
pub const TABLE_NAME: &str = "chunks";

const POSITION_COLUMN: &str = "position";
const EMBEDDING_COLUMN: &str = "embedding";
const DISTANCE_COLUMN: &str = "_distance";

/// LanceDB-backed vector index searched by L2 distance.
pub struct LanceDbIndex {
    table: Table,
    dimensions: usize,
}

impl LanceDbIndex {
    /// Create an empty index at `db_path`, or open the existing one.
    ///
    /// # Arguments
    /// * `db_path` - Directory for the LanceDB database
    /// * `dimensions` - Embedding dimensions (e.g., 384)
    pub async fn create(db_path: &Path, dimensions: usize) -> AppResult<Self> {
        if dimensions == 0 {
            return Err(AppError::Index(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }
        std::fs::create_dir_all(db_path)?;

        let conn = connect(db_path).await?;
        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|t| t == TABLE_NAME) {
            conn.open_table(TABLE_NAME)
                .execute()
                .await
                .map_err(|e| AppError::Index(format!("Failed to open table: {}", e)))?
        } else {
            let schema = create_schema(dimensions);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                TABLE_NAME,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to create table: {}", e)))?
        };

        let index = Self { table, dimensions };
        let stored = index.stored_dimensions().await?;
        if stored != dimensions {
            return Err(AppError::Index(format!(
                "Existing index at {} has {} dimensions, expected {}",
                db_path.display(),
                stored,
                dimensions
            )));
        }

        tracing::debug!("Initialized LanceDB index at {:?}", db_path);
        Ok(index)
    }

    /// Open an existing index, reading its dimensions from the table schema.
    pub async fn open(db_path: &Path) -> AppResult<Self> {
        if !db_path.is_dir() {
            return Err(AppError::Retrieval(format!(
                "No vector index at {}",
                db_path.display()
            )));
        }

        let conn = connect(db_path).await?;
        let table = conn
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AppError::CorruptIndex(format!("Failed to open table: {}", e)))?;

        let mut index = Self {
            table,
            dimensions: 0,
        };
        index.dimensions = index.stored_dimensions().await?;
        Ok(index)
    }

    async fn stored_dimensions(&self) -> AppResult<usize> {
        let schema = self
            .table
            .schema()
            .await
            .map_err(|e| AppError::Index(format!("Failed to read schema: {}", e)))?;

        let field = schema.field_with_name(EMBEDDING_COLUMN).map_err(|_| {
            AppError::CorruptIndex(format!("Index table has no '{}' column", EMBEDDING_COLUMN))
        })?;
        match field.data_type() {
            DataType::FixedSizeList(_, size) if *size > 0 => Ok(*size as usize),
            other => Err(AppError::CorruptIndex(format!(
                "Unexpected embedding column type: {}",
                other
            ))),
        }
    }

    fn to_batch(&self, embeddings: &[Vec<f32>]) -> AppResult<RecordBatch> {
        let schema = create_schema(self.dimensions);

        let mut values = Vec::with_capacity(embeddings.len() * self.dimensions);
        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != self.dimensions {
                return Err(AppError::Index(format!(
                    "Embedding {} has {} dimensions, expected {}",
                    i,
                    embedding.len(),
                    self.dimensions
                )));
            }
            values.extend_from_slice(embedding);
        }

        let positions = (0..embeddings.len())
            .map(|i| {
                u32::try_from(i).map_err(|_| {
                    AppError::Index(format!("Too many chunks for one index: {}", embeddings.len()))
                })
            })
            .collect::<AppResult<Vec<u32>>>()?;

        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimensions as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .map_err(|e| AppError::Index(format!("Failed to build embedding column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(UInt32Array::from(positions)),
                Arc::new(embedding_array),
            ],
        )
        .map_err(|e| AppError::Index(format!("Failed to create RecordBatch: {}", e)))
    }

    async fn clear(&self) -> AppResult<()> {
        let count = self
            .table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))?;

        if count > 0 {
            self.table
                .delete("position IS NOT NULL")
                .await
                .map_err(|e| AppError::Index(format!("Failed to reset index: {}", e)))?;
        }
        Ok(())
    }
}

async fn connect(db_path: &Path) -> AppResult<lancedb::Connection> {
    let uri = db_path.to_string_lossy().to_string();
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AppError::Index(format!("Failed to connect to LanceDB: {}", e)))
}

fn create_schema(dimensions: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(POSITION_COLUMN, DataType::UInt32, false),
        Field::new(
            EMBEDDING_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimensions as i32,
            ),
            false,
        ),
    ]))
}

/// Pull `(position, distance)` pairs out of one result batch.
fn batch_neighbors(batch: &RecordBatch) -> AppResult<Vec<Neighbor>> {
    let positions = batch
        .column_by_name(POSITION_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| AppError::CorruptIndex("Invalid position column".to_string()))?;
    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| AppError::Index("Search results carry no distances".to_string()))?;

    Ok((0..batch.num_rows())
        .filter(|&row| !positions.is_null(row))
        .map(|row| Neighbor {
            position: positions.value(row) as usize,
            distance: distances.value(row),
        })
        .collect())
}

#[async_trait::async_trait]
impl VectorIndex for LanceDbIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn build(&mut self, embeddings: &[Vec<f32>]) -> AppResult<()> {
        let batch = self.to_batch(embeddings)?;
        self.clear().await?;

        if batch.num_rows() > 0 {
            let schema = batch.schema();
            self.table
                .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
                .execute()
                .await
                .map_err(|e| AppError::Index(format!("Failed to add embeddings: {}", e)))?;
        }

        tracing::debug!("Wrote {} embeddings to LanceDB", embeddings.len());
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

        let batches = self
            .table
            .query()
            .nearest_to(query.to_vec())
            .map_err(|e| AppError::Retrieval(format!("Failed to create query: {}", e)))?
            .limit(k)
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to collect results: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(batch_neighbors(batch)?);
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        tracing::debug!("Retrieved {} neighbors (requested top-{})", hits.len(), k);
        Ok(hits)
    }

    async fn len(&self) -> AppResult<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_search_and_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("vectors");

        let mut index = LanceDbIndex::create(&db_path, 3).await.unwrap();
        index
            .build(&[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ])
            .await
            .unwrap();
        assert_eq!(index.len().await.unwrap(), 3);

        let reopened = LanceDbIndex::open(&db_path).await.unwrap();
        assert_eq!(reopened.dimensions(), 3);

        let hits = reopened.search(&[0.0, 0.9, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 1);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_build_replaces_rows() {
        let dir = TempDir::new().unwrap();
        let mut index = LanceDbIndex::create(dir.path(), 2).await.unwrap();
        index.build(&[vec![1.0, 1.0], vec![2.0, 2.0]]).await.unwrap();
        index.build(&[vec![3.0, 3.0]]).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut index = LanceDbIndex::create(dir.path(), 4).await.unwrap();
        assert!(matches!(
            index.build(&[vec![1.0, 2.0]]).await,
            Err(AppError::Index(_))
        ));
        assert!(matches!(
            index.search(&[1.0], 1).await,
            Err(AppError::Retrieval(_))
        ));
        assert!(LanceDbIndex::create(dir.path(), 8).await.is_err());
    }

    #[tokio::test]
    async fn test_open_missing_index() {
        let dir = TempDir::new().unwrap();
        let result = LanceDbIndex::open(&dir.path().join("absent")).await;
        assert!(matches!(result, Err(AppError::Retrieval(_))));
    }
}
