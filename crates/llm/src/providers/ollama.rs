//! Ollama LLM provider implementation.
//!
//! Talks to a local Ollama runtime through `/api/generate`.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use std::time::Duration;

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use crate::types::{DEFAULT_OLLAMA_URL, DEFAULT_TIMEOUT_SECS};
use docrag_core::{AppError, AppResult, RetryPolicy};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

/// Sampling options; Ollama ignores `null`s only inside `options`.
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client with the request timeout applied
    client: reqwest::Client,

    retry: RetryPolicy,
}

impl OllamaClient {
    /// Create a new Ollama client against `http://localhost:11434`.
    pub fn new() -> AppResult<Self> {
        Self::with_options(
            DEFAULT_OLLAMA_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            RetryPolicy::default(),
        )
    }

    /// Create a new Ollama client with a custom base URL, timeout and retry policy.
    pub fn with_options(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry,
        })
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            stream: request.stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    /// Convert Ollama response to LlmResponse.
    fn convert_response(&self, response: OllamaResponse) -> LlmResponse {
        let usage = LlmUsage::new(
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        );

        LlmResponse {
            content: response.response,
            model: response.model,
            usage,
            done: response.done,
        }
    }

    async fn send(&self, body: &OllamaRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::for_status(
                status.as_u16(),
                format!("Ollama API error ({}): {}", status, error_text),
                AppError::Generation,
            ));
        }

        Ok(response)
    }

    async fn complete_once(&self, body: &OllamaRequest) -> AppResult<LlmResponse> {
        let response = self.send(body).await?;

        // For non-streaming, Ollama returns a single JSON object
        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(self.convert_response(ollama_response))
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, prompt_len = request.prompt.len(), "Ollama completion");

        let mut body = self.to_ollama_request(request);
        body.stream = false;

        let response = self
            .retry
            .run("Ollama completion", || self.complete_once(&body))
            .await?;

        tracing::debug!(
            completion_tokens = response.usage.completion_tokens,
            "Received completion from Ollama"
        );
        Ok(response)
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, "Starting streaming request to Ollama");

        let mut body = self.to_ollama_request(request);
        body.stream = true;

        // Only connection setup is retried; a stream that breaks midway is surfaced.
        let response = self
            .retry
            .run("Ollama stream", || self.send(&body))
            .await?;

        // Ollama sends newline-delimited JSON
        let stream = response.bytes_stream().map(move |result| {
            let bytes =
                result.map_err(|e| AppError::Generation(format!("Stream error: {}", e)))?;

            let text = String::from_utf8_lossy(&bytes);
            let chunks: Vec<AppResult<LlmStreamChunk>> = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| {
                    let ollama_response: OllamaResponse = serde_json::from_str(line)
                        .map_err(|e| AppError::Parse(format!("Failed to parse chunk: {}", e)))?;

                    Ok(LlmStreamChunk {
                        content: ollama_response.response,
                        model: ollama_response.model,
                        done: ollama_response.done,
                        usage: if ollama_response.done {
                            Some(LlmUsage::new(
                                ollama_response.prompt_eval_count.unwrap_or(0),
                                ollama_response.eval_count.unwrap_or(0),
                            ))
                        } else {
                            None
                        },
                    })
                })
                .collect();

            Ok(futures::stream::iter(chunks))
        });

        Ok(Box::pin(stream.flat_map(|result| match result {
            Ok(chunks) => chunks,
            Err(e) => futures::stream::iter(vec![Err(e)]),
        })))
    }
}
