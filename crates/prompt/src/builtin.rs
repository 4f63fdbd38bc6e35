//! Prompts compiled into the binary.
//!
//! Each can be replaced by dropping a file with the same id into
//! `.docrag/prompts/`.

use crate::types::PromptDefinition;
use docrag_core::{AppError, AppResult};

pub const PROPOSITIONS: &str = "chunk.propositions";
pub const GROUPING: &str = "chunk.grouping";
pub const ANSWER: &str = "rag.answer";

const SOURCES: &[(&str, &str)] = &[
    (PROPOSITIONS, include_str!("../prompts/chunk.propositions.yml")),
    (GROUPING, include_str!("../prompts/chunk.grouping.yml")),
    (ANSWER, include_str!("../prompts/rag.answer.yml")),
];

/// Ids of every built-in prompt.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    SOURCES.iter().map(|(id, _)| *id)
}

/// Parse the built-in definition for `id`, if there is one.
pub fn builtin_prompt(id: &str) -> Option<AppResult<PromptDefinition>> {
    SOURCES.iter().find(|(known, _)| *known == id).map(|(_, yaml)| {
        serde_yaml::from_str(yaml)
            .map_err(|e| AppError::Prompt(format!("Built-in prompt '{}' is invalid: {}", id, e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_parse() {
        for id in builtin_ids() {
            let def = builtin_prompt(id).unwrap().unwrap();
            assert_eq!(def.id, id);
            assert!(!def.template.is_empty());
        }
    }

    #[test]
    fn test_chunking_prompts_are_low_temperature() {
        let props = builtin_prompt(PROPOSITIONS).unwrap().unwrap();
        assert_eq!(props.behavior.temperature, Some(0.1));
        assert_eq!(props.behavior.max_tokens, Some(1500));

        let grouping = builtin_prompt(GROUPING).unwrap().unwrap();
        assert_eq!(grouping.behavior.max_tokens, Some(1000));
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_prompt("agent.ask.default").is_none());
    }
}
