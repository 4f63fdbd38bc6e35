//! Prompt loader for YAML prompt definitions.

use crate::builtin::{builtin_ids, builtin_prompt};
use crate::types::PromptDefinition;
use docrag_core::config::STATE_DIR;
use docrag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join("prompts")
}

/// Load a prompt definition by ID.
///
/// `<workspace>/.docrag/prompts/<id>.yml` wins over the built-in definition
/// of the same id.
///
/// # Example
/// ```no_run
/// use docrag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> docrag_core::AppResult<()> {
/// let prompt = load_prompt(Path::new("."), "rag.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if prompt_file.exists() {
        tracing::debug!("Loading prompt from: {:?}", prompt_file);
        let definition = load_prompt_file(&prompt_file)?;
        tracing::info!("Using workspace prompt: {} ({})", definition.id, definition.title);
        return Ok(definition);
    }

    match builtin_prompt(prompt_id) {
        Some(definition) => {
            let definition = definition?;
            validate_prompt(&definition)?;
            Ok(definition)
        }
        None => Err(AppError::Prompt(format!(
            "Prompt '{}' not found in {:?} and no built-in prompt has that id",
            prompt_id,
            prompts_dir(workspace_path)
        ))),
    }
}

fn load_prompt_file(prompt_file: &Path) -> AppResult<PromptDefinition> {
    let contents = std::fs::read_to_string(prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// List available prompt IDs: built-ins plus workspace prompts, sorted.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = builtin_ids().map(str::to_string).collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' has an empty template",
            def.id
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
