//! Query result types.

use serde::{Deserialize, Serialize};

/// A retrieved chunk as shown to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Position in the persisted chunk list
    pub position: usize,

    /// Squared L2 distance to the query embedding
    pub distance: f32,

    pub text: String,
}

/// Outcome of a query: the retrieved chunks and, when generation ran, the
/// answer grounded on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    /// Nearest chunks, closest first
    pub chunks: Vec<RetrievedChunk>,
}

impl QueryResponse {
    /// The chunk texts in retrieval order.
    pub fn texts(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }
}
