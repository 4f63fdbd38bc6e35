//! Configuration management for docrag.
//!
//! Sources, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.docrag/config.yaml`)
//! - Environment variables (`DOCRAG_*`)
//! - Command-line flags
//!
//! The configuration is workspace-centric; the index, prompts and logs live
//! under `.docrag/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".docrag";

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_CHUNK_MODE: &str = "fixed";
pub const DEFAULT_TOP_K: usize = 10;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider used for answers and agentic chunking ("ollama", "openai")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Log file; relative paths resolve against the workspace
    pub log_file: Option<PathBuf>,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    pub embedding: EmbeddingSettings,

    pub chunking: ChunkingSettings,

    pub retrieval: RetrievalSettings,

    pub paths: PathSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "activeEmbeddingProvider", default)]
    pub active_embedding_provider: Option<String>,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint),
        }
    }

    pub fn embedding_model(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI {
                embedding_model, ..
            }
            | ProviderConfig::Ollama {
                embedding_model, ..
            } => embedding_model.as_deref(),
        }
    }

    /// Request timeout in seconds.
    pub fn timeout(&self) -> Option<u64> {
        match self {
            ProviderConfig::OpenAI { timeout, .. } | ProviderConfig::Ollama { timeout, .. } => {
                *timeout
            }
        }
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "ollama", "openai" or "trigram" (offline)
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    /// Embedding requests in flight during a build
    pub concurrency: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            concurrency: 4,
        }
    }
}

/// Chunking defaults used by `build`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub mode: String,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            mode: DEFAULT_CHUNK_MODE.to_string(),
        }
    }
}

impl ChunkingSettings {
    /// Reject size/overlap combinations that would never advance.
    pub fn validate(&self) -> AppResult<()> {
        validate_chunking(self.chunk_size, self.overlap)
    }
}

/// Shared check for every place a chunk size and overlap are accepted.
pub fn validate_chunking(chunk_size: usize, overlap: usize) -> AppResult<()> {
    if chunk_size == 0 {
        return Err(AppError::Config(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Locations of the document folder and the persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSettings {
    pub documents: PathBuf,
    pub index: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            documents: PathBuf::from("data"),
            index: PathBuf::from(STATE_DIR).join("index"),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    embedding: Option<EmbeddingSettings>,
    chunking: Option<ChunkingSettings>,
    retrieval: Option<RetrievalSettings>,
    paths: Option<PathSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_file: Some(PathBuf::from(STATE_DIR).join("logs").join("docrag.log")),
            llm: None,
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            paths: PathSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `DOCRAG_WORKSPACE`, `DOCRAG_CONFIG`
    /// - `DOCRAG_PROVIDER`, `DOCRAG_MODEL`, `DOCRAG_API_KEY`
    /// - `DOCRAG_EMBEDDING_PROVIDER`, `DOCRAG_EMBEDDING_MODEL`
    /// - `DOCRAG_CHUNK_SIZE`, `DOCRAG_CHUNK_OVERLAP`, `DOCRAG_CHUNK_MODE`
    /// - `DOCRAG_TOP_K`
    /// - `RUST_LOG`, `NO_COLOR`
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCRAG_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.docrag_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    /// Apply `DOCRAG_*` overrides read through `lookup`.
    fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("DOCRAG_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("DOCRAG_MODEL") {
            self.model = model;
        }
        if let Some(key) = lookup("DOCRAG_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(provider) = lookup("DOCRAG_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Some(model) = lookup("DOCRAG_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(size) = lookup("DOCRAG_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_number("DOCRAG_CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = lookup("DOCRAG_CHUNK_OVERLAP") {
            self.chunking.overlap = parse_number("DOCRAG_CHUNK_OVERLAP", &overlap)?;
        }
        if let Some(mode) = lookup("DOCRAG_CHUNK_MODE") {
            self.chunking.mode = mode;
        }
        if let Some(top_k) = lookup("DOCRAG_TOP_K") {
            self.retrieval.top_k = parse_number("DOCRAG_TOP_K", &top_k)?;
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }
        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }
        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merge_file(config_file))
    }

    fn merge_file(&self, config_file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(file) = logging.file {
                result.log_file = if file.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(file))
                };
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            // An embedding model named by the embedding provider's entry wins
            // over the built-in default, unless an explicit section follows.
            if let Some(ref embedding_provider) = llm.active_embedding_provider {
                result.embedding.provider = embedding_provider.clone();
                if let Some(model) = llm
                    .providers
                    .get(embedding_provider)
                    .and_then(|p| p.embedding_model())
                {
                    result.embedding.model = model.to_string();
                }
            }

            result.llm = Some(llm);
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(paths) = config_file.paths {
            result.paths = paths;
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Apply per-command chunking overrides.
    pub fn with_chunking(
        mut self,
        chunk_size: Option<usize>,
        overlap: Option<usize>,
        mode: Option<String>,
    ) -> Self {
        if let Some(chunk_size) = chunk_size {
            self.chunking.chunk_size = chunk_size;
        }
        if let Some(overlap) = overlap {
            self.chunking.overlap = overlap;
        }
        if let Some(mode) = mode {
            self.chunking.mode = mode;
        }
        self
    }

    /// Get the path to the .docrag directory.
    pub fn docrag_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Folder the loader reads documents from.
    pub fn documents_dir(&self) -> PathBuf {
        self.resolve(&self.paths.documents)
    }

    /// Folder holding the vector table, chunk list and manifest.
    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.paths.index)
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file.as_ref().map(|p| self.resolve(p))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Create `.docrag/`, the index directory and the log directory.
    pub fn ensure_dirs(&self) -> AppResult<()> {
        let mut dirs = vec![self.docrag_dir(), self.index_dir()];
        if let Some(parent) = self.log_file_path().and_then(|p| p.parent().map(Path::to_path_buf)) {
            dirs.push(parent);
        }

        for dir in dirs {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| {
                    AppError::Config(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }
        Ok(())
    }

    /// Get a provider's configuration block, if the file declared one.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Resolve API key: `DOCRAG_API_KEY` first, then the provider's `apiKeyEnv`,
    /// then `OPENAI_API_KEY` for the openai provider.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) = self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(&api_key_env) {
                return Some(key);
            }
        }

        if provider == "openai" {
            return std::env::var("OPENAI_API_KEY").ok();
        }

        None
    }

    /// Validate provider names, numeric settings and the chunking invariant.
    ///
    /// Credentials are not checked here; a missing API key only fails the
    /// commands that actually build a client for that provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["openai", "ollama"];
        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        let known_embedders = ["openai", "ollama", "trigram"];
        if !known_embedders.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_embedders.join(", ")
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }
        if self.embedding.concurrency == 0 {
            return Err(AppError::Config(
                "embedding concurrency must be at least 1".to_string(),
            ));
        }

        self.chunking.validate()
    }
}

fn parse_number(name: &str, value: &str) -> AppResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.chunking.mode, "fixed");
        assert_eq!(config.retrieval.top_k, 10);
        assert!(!config.verbose);
    }

    #[test]
    fn test_state_paths() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/work");
        assert_eq!(config.docrag_dir(), PathBuf::from("/work/.docrag"));
        assert_eq!(config.index_dir(), PathBuf::from("/work/.docrag/index"));
        assert_eq!(config.documents_dir(), PathBuf::from("/work/data"));
        assert_eq!(
            config.log_file_path(),
            Some(PathBuf::from("/work/.docrag/logs/docrag.log"))
        );
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_with_chunking() {
        let config = AppConfig::default().with_chunking(Some(200), None, Some("recursive".into()));
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.chunking.mode, "recursive");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = [
            ("DOCRAG_CHUNK_SIZE", "300"),
            ("DOCRAG_CHUNK_MODE", "semantic"),
            ("DOCRAG_TOP_K", "3"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.chunking.chunk_size, 300);
        assert_eq!(config.chunking.mode, "semantic");
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn test_env_rejects_bad_number() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|name| {
            (name == "DOCRAG_CHUNK_SIZE").then(|| "large".to_string())
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: openai
  activeEmbeddingProvider: openai
  providers:
    openai:
      apiKeyEnv: OPENAI_API_KEY
      model: gpt-4o
      embeddingModel: text-embedding-3-small
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
chunking:
  chunkSize: 800
  overlap: 80
  mode: agentic
logging:
  file: ""
"#,
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.mode, "agentic");
        assert!(config.log_file.is_none());
        assert!(matches!(
            config.get_provider_config("ollama"),
            Some(ProviderConfig::Ollama { .. })
        ));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.workspace = temp.path().to_path_buf();
        config.ensure_dirs().unwrap();
        assert!(temp.path().join(".docrag/index").is_dir());
        assert!(temp.path().join(".docrag/logs").is_dir());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_chunking() {
        let config = AppConfig::default().with_chunking(Some(100), Some(100), None);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));

        assert!(validate_chunking(0, 0).is_err());
        assert!(validate_chunking(4, 3).is_ok());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_zero_top_k_from_file_fails_validation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval:\n  topK: 0\n").unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_does_not_require_credentials() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: openai
  providers:
    openai:
      apiKeyEnv: DOCRAG_TEST_KEY_THAT_IS_NEVER_SET
      model: gpt-4o
"#,
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.provider, "openai");
        assert!(config.validate().is_ok());
    }
}
