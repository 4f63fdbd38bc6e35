//! OpenAI-compatible chat completions provider.
//!
//! Works against `api.openai.com` and any server exposing the same
//! `/v1/chat/completions` surface. Streaming uses server-sent events.

use std::time::Duration;

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use docrag_core::{AppError, AppResult, RetryPolicy};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

const CHAT_ENDPOINT: &str = "/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    model: String,
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
            retry,
        })
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> AppResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, CHAT_ENDPOINT);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to send request to OpenAI: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::for_status(
                status.as_u16(),
                format!("OpenAI API error ({}): {}", status, error_text),
                AppError::Generation,
            ));
        }
        Ok(response)
    }

    async fn complete_once(&self, body: &ChatRequest<'_>) -> AppResult<LlmResponse> {
        let response: ChatResponse = self
            .send(body)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse OpenAI response: {}", e)))?;
        convert_response(response)
    }
}

fn convert_response(response: ChatResponse) -> AppResult<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Generation("OpenAI returned no choices".to_string()))?;

    let usage = response
        .usage
        .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    Ok(LlmResponse {
        content: choice.message.content.unwrap_or_default(),
        model: response.model,
        usage,
        done: choice.finish_reason.as_deref() != Some("length"),
    })
}

/// Parse one SSE `data:` payload. `None` for keep-alives and the `[DONE]` marker.
fn parse_event(line: &str) -> Option<AppResult<LlmStreamChunk>> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(Ok(LlmStreamChunk {
            content: String::new(),
            model: String::new(),
            done: true,
            usage: None,
        }));
    }

    let event: StreamEvent = match serde_json::from_str(payload) {
        Ok(event) => event,
        Err(e) => {
            return Some(Err(AppError::Parse(format!(
                "Failed to parse stream event: {}",
                e
            ))))
        }
    };

    let choice = event.choices.into_iter().next();
    let content = choice
        .as_ref()
        .and_then(|c| c.delta.content.clone())
        .unwrap_or_default();
    let finished = choice.and_then(|c| c.finish_reason).is_some();

    Some(Ok(LlmStreamChunk {
        content,
        model: event.model,
        done: finished,
        usage: None,
    }))
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, prompt_len = request.prompt.len(), "OpenAI completion");
        let body = self.to_chat_request(request, false);
        self.retry
            .run("OpenAI completion", || self.complete_once(&body))
            .await
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, "Starting streaming request to OpenAI");
        let body = self.to_chat_request(request, true);
        let response = self.retry.run("OpenAI stream", || self.send(&body)).await?;

        // Events can straddle network reads, so complete lines are buffered.
        let mut pending = String::new();
        let stream = response.bytes_stream().map(move |result| {
            let bytes =
                result.map_err(|e| AppError::Generation(format!("Stream error: {}", e)))?;
            pending.push_str(&String::from_utf8_lossy(&bytes));

            let mut chunks = Vec::new();
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                if let Some(chunk) = parse_event(line.trim_end()) {
                    chunks.push(chunk);
                }
            }
            Ok(futures::stream::iter(chunks))
        });

        Ok(Box::pin(stream.flat_map(|result| match result {
            Ok(chunks) => chunks,
            Err(e) => futures::stream::iter(vec![Err(e)]),
        })))
    }
}
