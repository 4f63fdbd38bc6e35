//! Query command handler.
//!
//! Embeds the question with the model the index was built with, prints the
//! nearest chunks and, unless `--no-answer`, a generated answer.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};
use docrag_knowledge::{open_retriever, AnswerGenerator, EmbeddingConfig, Retriever};
use std::io::Write;

use super::print_json;

/// Retrieve relevant chunks and answer a question
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to retrieve (default: `retrieval.topK` from the config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Only retrieve; skip answer generation
    #[arg(long)]
    pub no_answer: bool,

    /// Stream the answer as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command");
        tracing::debug!("Query options: {:?}", self);

        let retriever = open_index(config).await?;
        let generator = if self.no_answer {
            None
        } else {
            Some(answer_generator(config)?)
        };

        self.run(config, &retriever, generator.as_ref(), &self.question)
            .await
    }

    /// Answer one question against an opened index.
    pub(crate) async fn run(
        &self,
        config: &AppConfig,
        retriever: &Retriever,
        generator: Option<&AnswerGenerator>,
        question: &str,
    ) -> AppResult<()> {
        let top_k = self.top_k.unwrap_or(config.retrieval.top_k);

        if self.stream && !self.json {
            if let Some(generator) = generator {
                let chunks = retriever.retrieve(question, top_k).await?;
                tracing::debug!("Retrieved {} chunks", chunks.len());

                generator
                    .generate_streaming(question, &chunks, |piece| {
                        print!("{}", piece);
                        std::io::stdout().flush().ok();
                    })
                    .await?;
                println!();
                return Ok(());
            }
        }

        let response = docrag_knowledge::query(retriever, generator, question, top_k).await?;

        if self.json {
            return print_json(&response);
        }

        if let Some(ref answer) = response.answer {
            println!("{}", answer);
            println!();
        }

        println!("Sources:");
        for chunk in &response.chunks {
            println!(
                "- [{}] (distance {:.4}) {}",
                chunk.position,
                chunk.distance,
                preview(&chunk.text, 120)
            );
        }

        Ok(())
    }
}

/// Open the workspace index, warning when the configured embedder differs
/// from the one the index was built with.
pub(crate) async fn open_index(config: &AppConfig) -> AppResult<Retriever> {
    let index_dir = config.index_dir();
    let built_with = docrag_knowledge::BuildManifest::load(&index_dir)?.embedding;

    let api_key = config.resolve_api_key(&built_with.provider);
    let retriever = open_retriever(&index_dir, api_key.as_deref()).await?;

    let configured = EmbeddingConfig::from_app_config(config);
    if let Err(e) = built_with.validate_consistency(&configured) {
        tracing::warn!(
            "Configured embedder differs from the index ({}); querying with {}/{}",
            e,
            built_with.provider,
            built_with.model
        );
    }

    Ok(retriever)
}

pub(crate) fn answer_generator(config: &AppConfig) -> AppResult<AnswerGenerator> {
    let client = docrag_llm::client_from_config(config)?;
    AnswerGenerator::new(client, &config.model, &config.workspace)
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_whitespace() {
        assert_eq!(preview("a\n\n b\tc", 20), "a b c");
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("ééééé", 3), "ééé...");
    }
}
