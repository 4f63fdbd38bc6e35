//! Prompt types for docrag.

use docrag_llm::LlmRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier (e.g., "chunk.grouping")
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Sampling settings sent with the request
    #[serde(default)]
    pub behavior: PromptBehavior,

    /// System message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Input specification
    #[serde(default)]
    pub input: PromptInputSpec,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Output specification
    pub output: PromptOutputSpec,
}

/// Sampling settings for prompt execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptBehavior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(rename = "maxTokens", default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Input specification for the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptInputSpec {
    /// Variables the template expects; all must be supplied when building
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format ("text", "lines", "groups")
    pub format: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Sampling settings copied from the definition
    pub behavior: PromptBehavior,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: String,
        behavior: PromptBehavior,
        resolved_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                behavior,
                resolved_variables,
            },
        }
    }

    /// A completion request for `model` carrying this prompt's system
    /// message and sampling settings.
    pub fn into_request(self, model: impl Into<String>) -> LlmRequest {
        let behavior = self.metadata.behavior;
        let mut request = LlmRequest::new(self.user, model);
        if let Some(system) = self.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = behavior.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = behavior.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}
