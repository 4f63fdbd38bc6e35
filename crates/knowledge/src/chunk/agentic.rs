//! Model-driven chunking.
//!
//! The model first restates the text as standalone propositions, then
//! partitions the proposition indices into groups in the compact form
//! `Group1: 0,1,3 | Group2: 2,4`. Each group becomes one chunk.
//!
//! Both calls are optional. Without a model, or when a call fails, the
//! propositions come from sentence splitting and the groups from greedy
//! packing, so a non-blank input always yields at least one chunk.

use super::sentences::split_sentences;
use super::{char_len, ChunkStrategy, ChunkingConfig};
use docrag_core::{AppError, AppResult};
use docrag_llm::LlmClient;
use docrag_prompt::builtin::{GROUPING, PROPOSITIONS};
use docrag_prompt::{build_prompt, load_prompt, PromptDefinition};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A language model plus the two prompts agentic chunking sends it.
#[derive(Clone)]
pub struct LlmHandle {
    client: Arc<dyn LlmClient>,
    model: String,
    propositions: PromptDefinition,
    grouping: PromptDefinition,
}

impl LlmHandle {
    /// Load the proposition and grouping prompts, honouring workspace
    /// overrides under `.docrag/prompts/`.
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: &Path,
    ) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.into(),
            propositions: load_prompt(workspace, PROPOSITIONS)?,
            grouping: load_prompt(workspace, GROUPING)?,
        })
    }

    async fn ask(
        &self,
        definition: &PromptDefinition,
        variables: HashMap<String, String>,
    ) -> AppResult<String> {
        let request = build_prompt(definition, variables)?.into_request(&self.model);
        let response = self.client.complete(&request).await?;
        Ok(response.content)
    }

    async fn propositions(&self, text: &str) -> AppResult<Vec<String>> {
        let vars = HashMap::from([("text".to_string(), text.to_string())]);
        let content = self.ask(&self.propositions, vars).await?;

        let propositions = parse_propositions(&content);
        if propositions.is_empty() {
            return Err(AppError::Generation(
                "Model returned no propositions".to_string(),
            ));
        }
        Ok(propositions)
    }

    async fn grouping(&self, propositions: &[String], chunk_size: usize) -> AppResult<String> {
        let listing = propositions
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}: {}", i, p))
            .collect::<Vec<_>>()
            .join("\n");
        let vars = HashMap::from([
            ("propositions".to_string(), listing),
            ("chunkSize".to_string(), chunk_size.to_string()),
        ]);
        self.ask(&self.grouping, vars).await
    }
}

pub struct AgenticChunker {
    llm: Option<LlmHandle>,
}

impl AgenticChunker {
    pub fn new(llm: Option<LlmHandle>) -> Self {
        Self { llm }
    }

    async fn propositions(&self, text: &str) -> Vec<String> {
        if let Some(llm) = &self.llm {
            match llm.propositions(text).await {
                Ok(propositions) => return propositions,
                Err(e) => warn!("Proposition extraction failed, using sentences: {}", e),
            }
        }
        split_sentences(text)
    }

    async fn groups(&self, propositions: &[String], chunk_size: usize) -> Option<Vec<Vec<usize>>> {
        let llm = self.llm.as_ref()?;
        match llm.grouping(propositions, chunk_size).await {
            Ok(response) => {
                let groups = parse_grouping(&response, propositions.len());
                if groups.is_empty() {
                    warn!("Grouping response had no usable groups, packing greedily");
                    None
                } else {
                    Some(groups)
                }
            }
            Err(e) => {
                warn!("Proposition grouping failed, packing greedily: {}", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl ChunkStrategy for AgenticChunker {
    async fn chunk(&self, text: &str, config: &ChunkingConfig) -> AppResult<Vec<String>> {
        if fits_loosely(char_len(text), config.chunk_size) {
            return Ok(vec![text.to_string()]);
        }

        let propositions = self.propositions(text).await;
        if propositions.is_empty() {
            return Ok(vec![text.to_string()]);
        }
        debug!(propositions = propositions.len(), "Extracted propositions");

        let chunks = match self.groups(&propositions, config.chunk_size).await {
            Some(groups) => groups
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|&i| propositions[i].as_str())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect(),
            None => greedy_group(&propositions, config.chunk_size),
        };

        if chunks.is_empty() {
            return Ok(vec![text.to_string()]);
        }
        Ok(chunks)
    }
}

/// `len <= 1.2 * chunk_size`, in integers.
fn fits_loosely(len: usize, chunk_size: usize) -> bool {
    len * 5 <= chunk_size * 6
}

/// One proposition per non-blank line, without list markers.
fn parse_propositions(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| strip_list_marker(line.trim()))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
    {
        return rest.trim();
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

/// Parse `Group1: 0,1 | Group2: 2` into index groups.
///
/// A group with a non-integer token is skipped, indices past `count` are
/// dropped, and a group left empty is skipped.
pub(crate) fn parse_grouping(response: &str, count: usize) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();

    for part in response.split('|') {
        let Some((_, indices)) = part.split_once(':') else {
            continue;
        };

        let parsed: Result<Vec<usize>, _> = indices
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::parse::<usize>)
            .collect();
        let Ok(parsed) = parsed else {
            debug!("Skipping unparsable group: {}", part.trim());
            continue;
        };

        let group: Vec<usize> = parsed.into_iter().filter(|&i| i < count).collect();
        if !group.is_empty() {
            groups.push(group);
        }
    }

    log_partition_gaps(&groups, count);
    groups
}

fn log_partition_gaps(groups: &[Vec<usize>], count: usize) {
    let mut seen = BTreeSet::new();
    let mut duplicates = 0;
    for &i in groups.iter().flatten() {
        if !seen.insert(i) {
            duplicates += 1;
        }
    }
    let omitted = count.saturating_sub(seen.len());
    if omitted > 0 || duplicates > 0 {
        debug!(omitted, duplicates, "Grouping is not a partition");
    }
}

/// Pack propositions in order while each chunk stays within 1.2x `chunk_size`.
pub(crate) fn greedy_group(propositions: &[String], chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for prop in propositions {
        let candidate = if current.is_empty() {
            char_len(prop)
        } else {
            char_len(&current) + 1 + char_len(prop)
        };

        if fits_loosely(candidate, chunk_size) {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(prop);
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = prop.clone();
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMode;
    use docrag_llm::{LlmRequest, LlmResponse, LlmStream, LlmUsage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records the requests it saw.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<AppResult<String>>>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Generation("script exhausted".to_string())));
            reply.map(|content| LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }

        async fn stream(&self, _request: &LlmRequest) -> AppResult<LlmStream> {
            Err(AppError::Generation("streaming not scripted".to_string()))
        }
    }

    fn handle(llm: Arc<ScriptedLlm>) -> LlmHandle {
        let workspace = tempfile::TempDir::new().unwrap();
        LlmHandle::new(llm, "test-model", workspace.path()).unwrap()
    }

    fn long_text() -> String {
        "Alpha facts come first here. Beta facts follow right after. \
         Gamma facts are third in line. Delta facts close the list."
            .to_string()
    }

    fn config(chunk_size: usize) -> ChunkingConfig {
        ChunkingConfig::new(chunk_size, 0, ChunkMode::Agentic)
    }

    #[tokio::test]
    async fn test_short_text_skips_the_model() {
        let llm = ScriptedLlm::new(vec![]);
        let chunker = AgenticChunker::new(Some(handle(llm.clone())));
        let text = "Twelve chars";
        let chunks = chunker.chunk(text, &config(10)).await.unwrap();
        assert_eq!(chunks, vec![text]);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_groups_become_chunks() {
        let llm = ScriptedLlm::new(vec![
            Ok("Alpha is first.\nBeta is second.\n- Gamma is third.\n\nDelta is last.".to_string()),
            Ok("Group1: 0,1 | Group2: 2,3".to_string()),
        ]);
        let chunker = AgenticChunker::new(Some(handle(llm.clone())));
        let chunks = chunker.chunk(&long_text(), &config(40)).await.unwrap();

        assert_eq!(
            chunks,
            vec!["Alpha is first. Beta is second.", "Gamma is third. Delta is last."]
        );
        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].temperature, Some(0.1));
        assert_eq!(seen[0].max_tokens, Some(1500));
        assert!(seen[1].prompt.contains("2: Gamma is third."));
        assert!(seen[1].prompt.contains("roughly 40 characters"));
    }

    #[tokio::test]
    async fn test_garbage_grouping_falls_back_to_greedy() {
        let llm = ScriptedLlm::new(vec![
            Ok("Alpha is first.\nBeta is second.\nGamma is third.".to_string()),
            Ok("I could not decide, sorry!".to_string()),
        ]);
        let chunker = AgenticChunker::new(Some(handle(llm)));
        let chunks = chunker.chunk(&long_text(), &config(20)).await.unwrap();

        assert_eq!(
            chunks,
            vec!["Alpha is first.", "Beta is second.", "Gamma is third."]
        );
    }

    #[tokio::test]
    async fn test_failed_grouping_covers_every_proposition() {
        let text = "This sentence is about twenty chars. ".repeat(28);
        assert!(text.chars().count() >= 1000);

        let llm = ScriptedLlm::new(vec![
            Err(AppError::Generation("proposition call refused".to_string())),
            Err(AppError::Generation("grouping call refused".to_string())),
        ]);
        let chunker = AgenticChunker::new(Some(handle(llm.clone())));
        let chunks = chunker.chunk(&text, &config(500)).await.unwrap();

        assert_eq!(llm.calls(), 2);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 600));
        assert_eq!(chunks.join(" "), text.trim());
    }

    #[tokio::test]
    async fn test_without_model_uses_sentences_and_greedy_packing() {
        let chunker = AgenticChunker::new(None);
        let text = long_text();
        let chunks = chunker.chunk(&text, &config(40)).await.unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_parse_grouping_is_permissive() {
        assert_eq!(
            parse_grouping("Group1: 0,1 | Group2: 2, 3 ,", 4),
            vec![vec![0, 1], vec![2, 3]]
        );
        // out-of-range indices are dropped, a group left empty is skipped
        assert_eq!(parse_grouping("G1: 0,9 | G2: 7", 3), vec![vec![0]]);
        // a non-integer token skips its whole group
        assert_eq!(parse_grouping("G1: 0,x | G2: 1", 3), vec![vec![1]]);
        // duplicates are kept as returned
        assert_eq!(parse_grouping("G1: 0,1 | G2: 1,2", 3), vec![vec![0, 1], vec![1, 2]]);
        assert!(parse_grouping("no groups at all", 3).is_empty());
        assert!(parse_grouping("", 3).is_empty());
    }

    #[test]
    fn test_greedy_group_respects_loose_limit() {
        let props: Vec<String> = ["aaaa", "bbbb", "cccc", "dddddddddddddd"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // limit is 12 chars for chunk_size 10
        assert_eq!(
            greedy_group(&props, 10),
            vec!["aaaa bbbb", "cccc", "dddddddddddddd"]
        );
    }

    #[test]
    fn test_parse_propositions_strips_markers() {
        assert_eq!(
            parse_propositions("1. One fact.\n  * Two fact.\n\n3) Three fact.\nPlain."),
            vec!["One fact.", "Two fact.", "Three fact.", "Plain."]
        );
    }
}
