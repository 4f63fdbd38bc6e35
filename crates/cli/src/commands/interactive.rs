//! Interactive command handler.
//!
//! Prompts for a mode (build, query or quit). Query mode reads questions
//! line by line until a blank line or `back`.

use clap::Args;
use docrag_core::{config::AppConfig, AppResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;

use super::query::{answer_generator, open_index};
use super::{BuildCommand, QueryCommand};

/// Choose build or query from a prompt
#[derive(Args, Debug)]
pub struct InteractiveCommand {
    /// Number of chunks to retrieve per question
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Only retrieve; skip answer generation
    #[arg(long)]
    pub no_answer: bool,
}

/// What the user picked at the mode prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Build,
    Query,
    Quit,
}

impl Selection {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "b" | "build" => Some(Self::Build),
            "2" | "q" | "query" => Some(Self::Query),
            "3" | "x" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

impl InteractiveCommand {
    pub async fn execute(&self, config: &AppConfig, cancel: &CancellationToken) -> AppResult<()> {
        tracing::info!("Executing interactive command");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            prompt("Mode [1] build  [2] query  [3] quit: ")?;
            let Some(line) = next_line(&mut lines, cancel).await? else {
                return Ok(());
            };

            match Selection::parse(&line) {
                Some(Selection::Build) => {
                    if let Err(e) = BuildCommand::default().execute(config, cancel).await {
                        eprintln!("Build failed: {}", e);
                    }
                }
                Some(Selection::Query) => self.query_loop(config, &mut lines, cancel).await?,
                Some(Selection::Quit) => return Ok(()),
                None => eprintln!("Unknown choice: {}", line.trim()),
            }

            if cancel.is_cancelled() {
                return Ok(());
            }
        }
    }

    async fn query_loop(
        &self,
        config: &AppConfig,
        lines: &mut Lines<BufReader<Stdin>>,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let retriever = match open_index(config).await {
            Ok(retriever) => retriever,
            Err(e) => {
                eprintln!("{}", e);
                return Ok(());
            }
        };

        let generator = if self.no_answer {
            None
        } else {
            match answer_generator(config) {
                Ok(generator) => Some(generator),
                Err(e) => {
                    tracing::warn!("Answer generation unavailable ({}); retrieval only", e);
                    None
                }
            }
        };

        let command = QueryCommand {
            question: String::new(),
            top_k: self.top_k,
            no_answer: self.no_answer,
            stream: false,
            json: false,
        };

        loop {
            prompt("Question (blank or 'back' to return): ")?;
            let Some(line) = next_line(lines, cancel).await? else {
                return Ok(());
            };
            let question = line.trim();
            if question.is_empty() || question.eq_ignore_ascii_case("back") {
                return Ok(());
            }

            tokio::select! {
                result = command.run(config, &retriever, generator.as_ref(), question) => {
                    if let Err(e) = result {
                        eprintln!("Query failed: {}", e);
                    }
                }
                _ = cancel.cancelled() => return Ok(()),
            }
            println!();
        }
    }
}

fn prompt(text: &str) -> AppResult<()> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(())
}

/// Next stdin line, or `None` at end of input or on cancellation.
async fn next_line(
    lines: &mut Lines<BufReader<Stdin>>,
    cancel: &CancellationToken,
) -> AppResult<Option<String>> {
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = cancel.cancelled() => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_parse() {
        assert_eq!(Selection::parse("1"), Some(Selection::Build));
        assert_eq!(Selection::parse(" Query \n"), Some(Selection::Query));
        assert_eq!(Selection::parse("exit"), Some(Selection::Quit));
        assert_eq!(Selection::parse("maybe"), None);
    }
}
