//! On-disk index layout.
//!
//! ```text
//! <index_dir>/
//!   vectors/        LanceDB table, one row per chunk
//!   chunks.json     chunk texts; position i matches row position i
//!   manifest.json   how the index was built
//! ```
//!
//! Every save stamps a fresh build id into the manifest, the chunk list and
//! `vectors/build_id`. All three are written to staging paths first and only
//! then renamed into place, so an interrupted save leaves either the previous
//! build or artifacts whose ids disagree, which `IndexedCorpus::open` reports
//! as corruption.

use crate::chunk::ChunkingConfig;
use crate::embeddings::EmbeddingConfig;
use crate::lancedb_index::LanceDbIndex;
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use docrag_core::{AppError, AppResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const VECTORS_DIR: &str = "vectors";
const STAGING_DIR: &str = "vectors.staging";
const PREVIOUS_DIR: &str = "vectors.previous";
const BUILD_ID_FILE: &str = "build_id";
const CHUNKS_FILE: &str = "chunks.json";
const MANIFEST_FILE: &str = "manifest.json";

/// How an index was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Shared with the chunk list and vector table of the same save.
    pub build_id: String,
    pub built_at: DateTime<Utc>,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub documents: usize,
    pub chunks: usize,
}

impl BuildManifest {
    pub fn new(
        chunking: ChunkingConfig,
        embedding: EmbeddingConfig,
        documents: usize,
        chunks: usize,
    ) -> Self {
        Self {
            build_id: uuid::Uuid::new_v4().to_string(),
            built_at: Utc::now(),
            chunking,
            embedding,
            documents,
            chunks,
        }
    }

    pub fn load(index_dir: &Path) -> AppResult<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(no_index(index_dir));
        }
        read_json(&path)
    }
}

/// The chunk texts of an index, in position order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<String>,
}

impl ChunkStore {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    /// Load the chunk list and the build id it was saved under.
    fn load(index_dir: &Path) -> AppResult<(String, Self)> {
        let path = index_dir.join(CHUNKS_FILE);
        if !path.exists() {
            return Err(no_index(index_dir));
        }
        let file: ChunkFile<Vec<String>> = read_json(&path)?;
        Ok((file.build_id, Self::new(file.chunks)))
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.chunks.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.chunks
    }
}

/// `chunks.json` contents.
#[derive(Serialize, Deserialize)]
struct ChunkFile<C> {
    build_id: String,
    chunks: C,
}

/// A chunk returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub position: usize,
    pub distance: f32,
    pub text: String,
}

/// A vector index together with the chunk texts it points into.
pub struct IndexedCorpus {
    index: Box<dyn VectorIndex>,
    chunks: ChunkStore,
    manifest: BuildManifest,
}

impl std::fmt::Debug for IndexedCorpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedCorpus")
            .field("dimensions", &self.index.dimensions())
            .field("chunks", &self.chunks.len())
            .field("manifest", &self.manifest)
            .finish()
    }
}

impl IndexedCorpus {
    /// Pair an index with its chunk list, checking they line up.
    pub async fn new(
        index: Box<dyn VectorIndex>,
        chunks: ChunkStore,
        manifest: BuildManifest,
    ) -> AppResult<Self> {
        let rows = index.len().await?;
        if rows != chunks.len() {
            return Err(AppError::CorruptIndex(format!(
                "Index has {} vectors but {} chunks",
                rows,
                chunks.len()
            )));
        }
        Ok(Self {
            index,
            chunks,
            manifest,
        })
    }

    /// Load a saved index from `index_dir`.
    pub async fn open(index_dir: &Path) -> AppResult<Self> {
        let manifest = BuildManifest::load(index_dir)?;
        let (chunks_build, chunks) = ChunkStore::load(index_dir)?;

        let vectors = index_dir.join(VECTORS_DIR);
        if !vectors.is_dir() {
            return Err(AppError::CorruptIndex(format!(
                "Chunk list present but vector table missing at {}",
                vectors.display()
            )));
        }
        let vectors_build = fs::read_to_string(vectors.join(BUILD_ID_FILE)).map_err(|e| {
            AppError::CorruptIndex(format!("Vector table has no build id: {}", e))
        })?;
        let vectors_build = vectors_build.trim();

        if chunks_build != manifest.build_id || vectors_build != manifest.build_id {
            return Err(AppError::CorruptIndex(format!(
                "Index files come from different builds (manifest {}, chunks {}, vectors {}); rebuild the index",
                manifest.build_id, chunks_build, vectors_build
            )));
        }

        let index = LanceDbIndex::open(&vectors).await?;

        if index.dimensions() != manifest.embedding.dimensions {
            return Err(AppError::CorruptIndex(format!(
                "Vector table has {} dimensions, manifest records {}",
                index.dimensions(),
                manifest.embedding.dimensions
            )));
        }

        Self::new(Box::new(index), chunks, manifest).await
    }

    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `k` chunks nearest to `query`, by ascending distance.
    pub async fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<ScoredChunk>> {
        let neighbors = self.index.search(query, k).await?;

        neighbors
            .into_iter()
            .map(|n| {
                let text = self.chunks.get(n.position).ok_or_else(|| {
                    AppError::CorruptIndex(format!(
                        "Neighbor position {} outside chunk list of {}",
                        n.position,
                        self.chunks.len()
                    ))
                })?;
                Ok(ScoredChunk {
                    position: n.position,
                    distance: n.distance,
                    text: text.to_string(),
                })
            })
            .collect()
    }
}

/// Persist a build, replacing any previous index in `index_dir`.
pub async fn save_index(
    index_dir: &Path,
    embeddings: &[Vec<f32>],
    chunks: &ChunkStore,
    manifest: &BuildManifest,
) -> AppResult<()> {
    if embeddings.is_empty() {
        return Err(AppError::Index(
            "No embeddings provided; check that the documents contain text".to_string(),
        ));
    }
    if embeddings.len() != chunks.len() {
        return Err(AppError::Index(format!(
            "{} embeddings for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }

    fs::create_dir_all(index_dir)?;

    let staging = index_dir.join(STAGING_DIR);
    remove_dir_if_exists(&staging)?;
    {
        let mut index = LanceDbIndex::create(&staging, manifest.embedding.dimensions).await?;
        index.build(embeddings).await?;
    }
    fs::write(staging.join(BUILD_ID_FILE), &manifest.build_id)?;

    let chunks_path = index_dir.join(CHUNKS_FILE);
    let manifest_path = index_dir.join(MANIFEST_FILE);
    write_json(
        &tmp_path(&chunks_path),
        &ChunkFile {
            build_id: manifest.build_id.clone(),
            chunks: chunks.as_slice(),
        },
    )?;
    write_json(&tmp_path(&manifest_path), manifest)?;

    // Everything is staged; swap it in.
    let vectors = index_dir.join(VECTORS_DIR);
    let previous = index_dir.join(PREVIOUS_DIR);
    remove_dir_if_exists(&previous)?;
    if vectors.exists() {
        fs::rename(&vectors, &previous)?;
    }
    fs::rename(&staging, &vectors)?;
    fs::rename(tmp_path(&chunks_path), &chunks_path)?;
    fs::rename(tmp_path(&manifest_path), &manifest_path)?;
    remove_dir_if_exists(&previous)?;

    tracing::info!(
        "Saved index with {} chunks to {}",
        chunks.len(),
        index_dir.display()
    );
    Ok(())
}

fn no_index(index_dir: &Path) -> AppError {
    AppError::Retrieval(format!(
        "No index found at {}. Run 'docrag build' first.",
        index_dir.display()
    ))
}

fn remove_dir_if_exists(path: &Path) -> AppResult<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::CorruptIndex(format!("Failed to parse {}: {}", path.display(), e)))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
