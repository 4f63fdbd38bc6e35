//! Language-model integration for docrag.
//!
//! A provider-agnostic [`LlmClient`] trait with Ollama and OpenAI-compatible
//! implementations, plus a factory that builds a client from configuration.
//!
//! # Example
//! ```no_run
//! use docrag_llm::{create_client, ClientOptions, LlmRequest};
//!
//! # async fn example() -> docrag_core::AppResult<()> {
//! let client = create_client("ollama", &ClientOptions::default())?;
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

pub use client::{
    collect_stream, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
pub use factory::{client_from_config, create_client};
pub use providers::{OllamaClient, OpenAiClient};
pub use types::{ClientOptions, ProviderType};
