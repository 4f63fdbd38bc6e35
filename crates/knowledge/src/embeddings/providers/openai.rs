//! OpenAI-compatible embedding provider (`/v1/embeddings`).

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use docrag_core::{AppError, AppResult, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const EMBEDDING_ENDPOINT: &str = "/v1/embeddings";

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::Config(format!("Failed to create HTTP client for OpenAI: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config
                .endpoint
                .as_deref()
                .unwrap_or(DEFAULT_OPENAI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy::default(),
        })
    }

    /// One request for up to `batch_size` non-blank texts.
    async fn request(&self, input: &[&str]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to OpenAI: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::for_status(
                status.as_u16(),
                format!("OpenAI API error ({}): {}", status, error_text),
                AppError::Embedding,
            ));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to parse OpenAI response: {}", e)))?;

        order_embeddings(body, input.len(), self.dimensions)
    }
}

/// Put response vectors back in request order and check their shape.
fn order_embeddings(
    body: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if body.data.len() != expected {
        return Err(AppError::Embedding(format!(
            "OpenAI returned {} embeddings for {} inputs",
            body.data.len(),
            expected
        )));
    }

    let mut ordered: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in body.data {
        if item.embedding.len() != dimensions {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                item.embedding.len(),
                dimensions
            )));
        }
        let slot = ordered.get_mut(item.index).ok_or_else(|| {
            AppError::Embedding(format!("Embedding index {} out of range", item.index))
        })?;
        *slot = Some(item.embedding);
    }

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| AppError::Embedding(format!("Missing embedding for input {}", i)))
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut results: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];

        let non_blank: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.as_str()))
            .collect();

        for batch in non_blank.chunks(self.batch_size) {
            let input: Vec<&str> = batch.iter().map(|(_, t)| *t).collect();
            debug!("Requesting {} embeddings", input.len());
            let vectors = self
                .retry
                .run("OpenAI embedding", || self.request(&input))
                .await?;
            for ((slot, _), vector) in batch.iter().zip(vectors) {
                results[*slot] = vector;
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(items: &[(usize, usize)]) -> EmbeddingResponse {
        EmbeddingResponse {
            data: items
                .iter()
                .map(|(index, dims)| EmbeddingData {
                    index: *index,
                    embedding: vec![*index as f32; *dims],
                })
                .collect(),
        }
    }

    #[test]
    fn test_order_embeddings_restores_input_order() {
        let ordered = order_embeddings(response(&[(1, 3), (0, 3)]), 2, 3).unwrap();
        assert_eq!(ordered[0], vec![0.0; 3]);
        assert_eq!(ordered[1], vec![1.0; 3]);
    }

    #[test]
    fn test_order_embeddings_rejects_wrong_dimensions() {
        let result = order_embeddings(response(&[(0, 4)]), 1, 3);
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[test]
    fn test_order_embeddings_rejects_short_response() {
        let result = order_embeddings(response(&[(0, 3)]), 2, 3);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_shape() {
        let input = ["alpha", "beta"];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
        })
        .unwrap();
        assert_eq!(body["input"][1], "beta");
        assert_eq!(body["model"], "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_blank_batch_makes_no_request() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            endpoint: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config, "sk-test").unwrap();
        let out = provider
            .embed_batch(&["".to_string(), " ".to_string()])
            .await
            .unwrap();
        assert_eq!(out, vec![Vec::<f32>::new(), Vec::new()]);
    }
}
