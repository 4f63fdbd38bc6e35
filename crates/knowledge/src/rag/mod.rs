//! Retrieval and answer generation.

pub mod answer;
pub mod retriever;
pub mod types;

pub use answer::AnswerGenerator;
pub use retriever::Retriever;
pub use types::{QueryResponse, RetrievedChunk};
