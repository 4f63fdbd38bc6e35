//! LLM provider factory.
//!
//! Resolves a provider name to a client implementation, injecting the
//! endpoint, credentials, timeout and retry policy.

use std::sync::Arc;

use docrag_core::{AppConfig, AppError, AppResult};

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::{ClientOptions, ProviderType};

/// Create an LLM client based on the provider name.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, a required API key
/// is missing, or the HTTP client cannot be built.
pub fn create_client(provider: &str, options: &ClientOptions) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            provider
        ))
    })?;

    let endpoint = options
        .endpoint
        .clone()
        .unwrap_or_else(|| provider_type.default_endpoint().to_string());

    match provider_type {
        ProviderType::Ollama => {
            let client = OllamaClient::with_options(endpoint, options.timeout, options.retry)?;
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let api_key = options.api_key.clone().ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let client = OpenAiClient::new(endpoint, api_key, options.timeout, options.retry)?;
            Ok(Arc::new(client))
        }
    }
}

/// Create the client for the configured generation provider.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let options = ClientOptions::from_config(config, &config.provider);
    tracing::debug!(
        "Creating LLM client: provider={}, model={}, endpoint={:?}",
        config.provider,
        config.model,
        options.endpoint
    );
    create_client(&config.provider, &options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", &ClientOptions::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let options = ClientOptions::default().with_endpoint("http://localhost:8080");
        assert!(create_client("ollama", &options).is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", &ClientOptions::default()) {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_create_openai_client() {
        let options = ClientOptions::default().with_api_key("sk-test");
        let client = create_client("openai", &options).unwrap();
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("gguf", &ClientOptions::default()) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
