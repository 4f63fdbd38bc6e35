//! Provider selection and connection options.

use std::time::Duration;

use docrag_core::config::{AppConfig, ProviderConfig};
use docrag_core::RetryPolicy;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Request timeout applied when the config does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Ollama,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAI => DEFAULT_OPENAI_URL,
            Self::Ollama => DEFAULT_OLLAMA_URL,
        }
    }
}

/// How to reach a provider.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL; the provider default when `None`
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    /// Options for `provider` as declared in the application config.
    pub fn from_config(config: &AppConfig, provider: &str) -> Self {
        let block: Option<ProviderConfig> = config.get_provider_config(provider);
        let endpoint = block
            .as_ref()
            .and_then(|b| b.endpoint())
            .map(str::to_string)
            .or_else(|| std::env::var(format!("{}_URL", provider.to_uppercase())).ok());
        let timeout = block
            .as_ref()
            .and_then(|b| b.timeout())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            endpoint,
            api_key: config.resolve_api_key(provider),
            timeout: Duration::from_secs(timeout),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("openai"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("Ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("claude"), None);
        assert_eq!(ProviderType::Ollama.as_str(), "ollama");
    }

    #[test]
    fn test_default_options() {
        let options = ClientOptions::default().with_endpoint("http://gpu-box:11434");
        assert_eq!(options.endpoint.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(options.timeout, Duration::from_secs(60));
        assert_eq!(options.retry.max_attempts, 3);
    }
}
