
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::RagError;

pub const CONFIG_DIR_ENV: &str = "PDF_RAG_CONFIG_DIR";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub chunking: ChunkingSettings,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Ollama-compatible endpoint used to embed chunks and queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatProviderKind {
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::fmt::Display for ChatProviderKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ChatProviderKind::Ollama => write!(f, "ollama"),
            ChatProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ChatProviderKind {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ChatProviderKind::Ollama),
            "openai" => Ok(ChatProviderKind::OpenAi),
            other => Err(ConfigError::InvalidChatProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub provider: ChatProviderKind,
    pub model: String,
    pub ollama_base_url: String,
    pub openai_base_url: String,
    /// Name of the environment variable holding the hosted provider's API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatProviderKind::Ollama,
            model: "llama3.2".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl ChatConfig {
    #[inline]
    pub fn base_url_for(&self, provider: ChatProviderKind) -> &str {
        match provider {
            ChatProviderKind::Ollama => &self.ollama_base_url,
            ChatProviderKind::OpenAi => &self.openai_base_url,
        }
    }
}

/// Character-window chunking parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    /// Embed every chunk, then swap the whole document in one write
    #[default]
    Atomic,
    /// Truncate first, then append each chunk as soon as it is embedded
    Incremental,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub indexing_mode: IndexingMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid chat provider: {0} (must be 'ollama' or 'openai')")]
    InvalidChatProvider(String),
    #[error("Invalid API key variable name: {0} (cannot be empty)")]
    InvalidApiKeyEnv(String),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top-k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid upload limit: {0} bytes (must be at least 1 KiB)")]
    InvalidUploadLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for RagError {
    #[inline]
    fn from(error: ConfigError) -> Self {
        RagError::Config(error.to_string())
    }
}

impl Config {
    /// Default configuration directory, honouring `PDF_RAG_CONFIG_DIR`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join("pdf-rag"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn load_default() -> Result<Self> {
        let dir = Self::default_dir().context("Failed to determine configuration directory")?;
        Self::load(dir)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.chat.validate()?;
        self.chunking.validate()?;

        if !(1..=50).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if self.server.max_upload_bytes < 1024 {
            return Err(ConfigError::InvalidUploadLimit(
                self.server.max_upload_bytes,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Get the path for the SQLite chunk store
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("chunks.db")
    }

    #[inline]
    pub fn embedding_url(&self) -> Result<Url, ConfigError> {
        self.embedding.endpoint_url()
    }
}

fn validate_timeout(timeout_secs: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&timeout_secs) {
        return Err(ConfigError::InvalidTimeout(timeout_secs));
    }
    Ok(())
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.endpoint_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        validate_timeout(self.timeout_secs)
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.endpoint_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        for base_url in [&self.ollama_base_url, &self.openai_base_url] {
            let url =
                Url::parse(base_url).map_err(|_| ConfigError::InvalidUrl(base_url.clone()))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
            }
        }

        if self.provider == ChatProviderKind::OpenAi && self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        validate_timeout(self.timeout_secs)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_provider(&mut self, provider: ChatProviderKind) -> Result<(), ConfigError> {
        if provider == ChatProviderKind::OpenAi && self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }
        self.provider = provider;
        Ok(())
    }

    pub fn set_base_url(
        &mut self,
        provider: ChatProviderKind,
        base_url: String,
    ) -> Result<(), ConfigError> {
        Url::parse(&base_url).map_err(|_| ConfigError::InvalidUrl(base_url.clone()))?;
        match provider {
            ChatProviderKind::Ollama => self.ollama_base_url = base_url,
            ChatProviderKind::OpenAi => self.openai_base_url = base_url,
        }
        Ok(())
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100_000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(self.overlap, self.chunk_size));
        }

        Ok(())
    }
}
