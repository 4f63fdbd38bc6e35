//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use docrag_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Every variable listed in the definition's `input.variables` must be
/// present; anything else in `variables` is passed through to the template.
///
/// # Example
/// ```no_run
/// use docrag_prompt::{build_prompt, load_prompt};
/// use std::collections::HashMap;
/// use std::path::Path;
///
/// # fn example() -> docrag_core::AppResult<()> {
/// let def = load_prompt(Path::new("."), "rag.answer")?;
/// let mut vars = HashMap::new();
/// vars.insert("context".to_string(), "Rust has no GC.".to_string());
/// vars.insert("question".to_string(), "Does Rust have a GC?".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let missing: Vec<&str> = definition
        .input
        .variables
        .iter()
        .filter(|name| !variables.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' is missing variables: {}",
            definition.id,
            missing.join(", ")
        )));
    }

    let user = render_template(&definition.template, &variables)?;
    let system = match definition.system {
        Some(ref system) => Some(render_template(system, &variables)?),
        None => None,
    };

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        definition.behavior.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text; HTML escaping would mangle quotes in documents.
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptBehavior, PromptInputSpec, PromptOutputSpec};

    fn definition(variables: &[&str]) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            behavior: PromptBehavior {
                temperature: Some(0.1),
                max_tokens: Some(1000),
            },
            system: Some("Target {{chunkSize}} characters.".to_string()),
            input: PromptInputSpec {
                variables: variables.iter().map(|v| v.to_string()).collect(),
            },
            template: "Question: {{question}}".to_string(),
            output: PromptOutputSpec {
                format: "text".to_string(),
            },
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_does_not_escape() {
        let result = render_template(
            "Question: {{question}}",
            &vars(&[("question", "is \"a < b\" & c?")]),
        );
        assert_eq!(result.unwrap(), "Question: is \"a < b\" & c?");
    }

    #[test]
    fn test_build_prompt_renders_system_and_user() {
        let def = definition(&["question"]);
        let built = build_prompt(
            &def,
            vars(&[("question", "What is a chunk?"), ("chunkSize", "500")]),
        )
        .unwrap();

        assert_eq!(built.user, "Question: What is a chunk?");
        assert_eq!(built.system.as_deref(), Some("Target 500 characters."));
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
        assert_eq!(built.metadata.behavior.max_tokens, Some(1000));
    }

    #[test]
    fn test_build_prompt_missing_variable() {
        let def = definition(&["question", "context"]);
        let err = build_prompt(&def, vars(&[("question", "q")])).unwrap_err();
        assert!(err.to_string().contains("context"));
    }

    #[test]
    fn test_render_template_missing_optional_variable() {
        let result = render_template("Question: {{missing}}", &HashMap::new());
        // Handlebars renders missing variables as empty string
        assert_eq!(result.unwrap(), "Question: ");
    }
}
