//! Answer generation grounded on retrieved chunks.

use docrag_core::{AppError, AppResult};
use docrag_llm::{collect_stream, LlmClient, LlmRequest};
use docrag_prompt::builtin::ANSWER;
use docrag_prompt::{build_prompt, load_prompt, PromptDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Asks a language model to answer a question from retrieved context.
pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl AnswerGenerator {
    /// Uses the `rag.answer` prompt, or its workspace override.
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: &Path,
    ) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.into(),
            prompt: load_prompt(workspace, ANSWER)?,
        })
    }

    fn request(&self, question: &str, chunks: &[String]) -> AppResult<LlmRequest> {
        if question.trim().is_empty() {
            return Err(AppError::Generation("Question is empty".to_string()));
        }

        let vars = HashMap::from([
            ("context".to_string(), build_context(chunks)),
            ("question".to_string(), question.to_string()),
        ]);
        Ok(build_prompt(&self.prompt, vars)?.into_request(&self.model))
    }

    /// Generate an answer. Model failures are returned, not masked.
    pub async fn generate(&self, question: &str, chunks: &[String]) -> AppResult<String> {
        let request = self.request(question, chunks)?;
        tracing::debug!(
            "Generating answer with {} ({} context chunks)",
            self.client.provider_name(),
            chunks.len()
        );

        let response = self.client.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }

    /// Generate an answer, passing each streamed piece to `on_chunk`.
    pub async fn generate_streaming<F>(
        &self,
        question: &str,
        chunks: &[String],
        on_chunk: F,
    ) -> AppResult<String>
    where
        F: FnMut(&str),
    {
        let request = self.request(question, chunks)?.with_streaming();
        let stream = self.client.stream(&request).await?;
        let response = collect_stream(stream, on_chunk).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Number the chunks so the model can tell them apart.
fn build_context(chunks: &[String]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_llm::{LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct EchoLlm {
        fail: bool,
        last_prompt: Mutex<Option<LlmRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for EchoLlm {
        fn provider_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            *self.last_prompt.lock().unwrap() = Some(request.clone());
            if self.fail {
                return Err(AppError::Generation("model offline".to_string()));
            }
            Ok(LlmResponse {
                content: "  Rust has no garbage collector.\n".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }

        async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
            let pieces = ["Rust ", "has ", "no GC."].map(|p| {
                Ok(LlmStreamChunk {
                    content: p.to_string(),
                    model: request.model.clone(),
                    done: p.ends_with('.'),
                    usage: None,
                })
            });
            Ok(Box::pin(futures::stream::iter(pieces)))
        }
    }

    fn generator(fail: bool) -> (Arc<EchoLlm>, AnswerGenerator) {
        let llm = Arc::new(EchoLlm {
            fail,
            last_prompt: Mutex::new(None),
        });
        let workspace = TempDir::new().unwrap();
        let generator = AnswerGenerator::new(llm.clone(), "llama3.2", workspace.path()).unwrap();
        (llm, generator)
    }

    #[tokio::test]
    async fn test_generate_fills_prompt() {
        let (llm, generator) = generator(false);
        let chunks = vec!["Rust uses ownership.".to_string(), "No GC needed.".to_string()];

        let answer = generator.generate("Does Rust have a GC?", &chunks).await.unwrap();
        assert_eq!(answer, "Rust has no garbage collector.");

        let request = llm.last_prompt.lock().unwrap().clone().unwrap();
        assert!(request.prompt.contains("[1] Rust uses ownership."));
        assert!(request.prompt.contains("[2] No GC needed."));
        assert!(request.prompt.contains("Question: Does Rust have a GC?"));
        assert!(request.system.is_some());
        assert_eq!(request.model, "llama3.2");
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let (_, generator) = generator(true);
        let result = generator.generate("Anything?", &["ctx".to_string()]).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }

    #[tokio::test]
    async fn test_streaming_collects_pieces() {
        let (_, generator) = generator(false);
        let mut pieces = Vec::new();
        let answer = generator
            .generate_streaming("GC?", &["ctx".to_string()], |p| pieces.push(p.to_string()))
            .await
            .unwrap();
        assert_eq!(answer, "Rust has no GC.");
        assert_eq!(pieces.len(), 3);
    }
}
