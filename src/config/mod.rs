// Configuration management module
// TOML settings plus the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ChatConfig, ChatProviderKind, ChunkingSettings, Config, ConfigError, EmbeddingConfig,
    IndexingMode, RetrievalConfig, ServerConfig, StoreBackend, StoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
