//! Prompt system for docrag.
//!
//! - YAML-based prompt definitions
//! - Built-in defaults for proposition extraction, grouping and answers
//! - Workspace overrides under `.docrag/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptInputSpec,
    PromptOutputSpec,
};
