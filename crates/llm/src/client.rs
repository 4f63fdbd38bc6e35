//! Language-model client abstraction and request/response types.
//!
//! docrag talks to a model in three places: proposition extraction and
//! grouping during agentic chunking, and final answer generation. All three
//! go through [`LlmClient`].

use futures::{Stream, StreamExt};
use docrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// One prompt for a model, with optional sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// User prompt
    pub prompt: String,

    /// Model identifier (e.g., "llama3.2", "gpt-4o")
    pub model: String,

    /// Instructions sent ahead of the prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature; the provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Completion length cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub stream: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask the provider to stream the completion.
    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// A finished completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,

    /// Model that produced the text, as reported by the provider
    pub model: String,

    #[serde(default)]
    pub usage: LlmUsage,

    /// False when the provider stopped before signalling completion
    #[serde(default = "completed")]
    pub done: bool,
}

fn completed() -> bool {
    true
}

/// Token counts reported by the provider; zero when it reports none.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One piece of a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    pub content: String,
    pub model: String,

    /// Set on the last piece
    #[serde(default)]
    pub done: bool,

    /// Only present on the last piece
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

/// Pieces of a streamed completion, in order.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// Trait for LLM providers.
///
/// Implemented by the Ollama and OpenAI-compatible clients, and by scripted
/// fakes in tests.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "ollama", "openai").
    fn provider_name(&self) -> &str;

    /// Send the request and wait for the whole completion.
    ///
    /// Transport and server failures surface as `AppError::Generation`; a
    /// request the service refuses is `AppError::Rejected`.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    /// Send the request and return the completion as it is produced.
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;
}

/// Drain a stream into one response, forwarding each piece to `on_chunk`.
pub async fn collect_stream<F>(mut stream: LlmStream, mut on_chunk: F) -> AppResult<LlmResponse>
where
    F: FnMut(&str),
{
    let mut content = String::new();
    let mut model = String::new();
    let mut usage = LlmUsage::default();
    let mut done = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        on_chunk(&chunk.content);
        content.push_str(&chunk.content);
        if model.is_empty() {
            model = chunk.model;
        }
        if let Some(u) = chunk.usage {
            usage = u;
        }
        if chunk.done {
            done = true;
            break;
        }
    }

    if !done && content.is_empty() {
        return Err(AppError::Generation(
            "Stream ended without producing any content".to_string(),
        ));
    }

    Ok(LlmResponse {
        content,
        model,
        usage,
        done,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, done: bool) -> AppResult<LlmStreamChunk> {
        Ok(LlmStreamChunk {
            content: content.to_string(),
            model: "test-model".to_string(),
            done,
            usage: done.then(|| LlmUsage::new(10, 3)),
        })
    }

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("Split this", "gpt-4o")
            .with_temperature(0.1)
            .with_max_tokens(1500)
            .with_system("You split text into propositions.");
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(1500));
        assert!(!request.stream);
        assert!(request.with_streaming().stream);
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let stream: LlmStream = Box::pin(futures::stream::iter(vec![
            chunk("Paris ", false),
            chunk("is the capital.", true),
        ]));
        let mut seen = Vec::new();
        let response = collect_stream(stream, |piece| seen.push(piece.to_string()))
            .await
            .unwrap();
        assert_eq!(response.content, "Paris is the capital.");
        assert_eq!(response.usage.total_tokens, 13);
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_error() {
        let stream: LlmStream = Box::pin(futures::stream::iter(vec![
            chunk("partial", false),
            Err(AppError::Generation("connection dropped".to_string())),
        ]));
        let result = collect_stream(stream, |_| {}).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }
}
