
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{
    ChatConfig, ChatProviderKind, ChunkingSettings, Config, ConfigError, EmbeddingConfig,
    IndexingMode, StoreBackend,
};
use crate::embeddings::OllamaClient;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 PDF RAG Configuration Setup").bold().cyan());
    eprintln!();

    let dir = Config::default_dir().context("Failed to determine configuration directory")?;
    let mut config = load_existing_config(&dir)?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Configure the Ollama-compatible server that embeds document chunks.");
    eprintln!();
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Chat Provider").bold().yellow());
    configure_chat(&mut config.chat)?;

    eprintln!();
    eprintln!("{}", style("Chunking and Storage").bold().yellow());
    configure_chunking(&mut config.chunking)?;
    configure_store(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing embedding provider...").yellow());
    if test_embedding_connection(&config.embedding) {
        eprintln!("{}", style("✓ Embedding provider reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the embedding provider").yellow()
        );
        eprintln!("You can continue, but make sure it is running before indexing.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    eprint!("{}", render_summary(&config));
    Ok(())
}

/// Human-readable summary of the effective settings
#[inline]
pub fn render_summary(config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("📋 Current Configuration").bold().cyan());
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Embedding:").bold().yellow());
    match config.embedding_url() {
        Ok(url) => {
            let _ = writeln!(out, "  URL: {}", style(url).cyan());
        }
        Err(e) => {
            let _ = writeln!(out, "  URL: {} ({})", style("Invalid").red(), e);
        }
    }
    let _ = writeln!(out, "  Model: {}", style(&config.embedding.model).cyan());
    let _ = writeln!(out, "  Timeout: {}s", config.embedding.timeout_secs);

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Chat:").bold().yellow());
    let provider = config.chat.provider;
    let _ = writeln!(out, "  Provider: {}", style(provider).cyan());
    let _ = writeln!(out, "  Model: {}", style(&config.chat.model).cyan());
    let _ = writeln!(
        out,
        "  URL: {}",
        style(config.chat.base_url_for(provider)).cyan()
    );
    if provider == ChatProviderKind::OpenAi {
        let _ = writeln!(out, "  API key variable: {}", config.chat.api_key_env);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Retrieval:").bold().yellow());
    let _ = writeln!(
        out,
        "  Chunk size: {} (overlap {})",
        config.chunking.chunk_size, config.chunking.overlap
    );
    let _ = writeln!(out, "  Top k: {}", config.retrieval.top_k);
    let _ = writeln!(
        out,
        "  Store: {:?} ({:?} indexing)",
        config.store.backend, config.store.indexing_mode
    );
    let _ = writeln!(
        out,
        "  Server: {}:{}",
        config.server.host, config.server.port
    );

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    out
}

fn load_existing_config(dir: &Path) -> Result<Config> {
    let config = Config::load(dir)?;
    if config.config_file_path().exists() {
        eprintln!("{}", style("Found existing configuration.").green());
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
    }
    Ok(config)
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;
    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            EmbeddingConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            }
            .validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(non_empty("Model name"))
        .interact_text()?;

    embedding.set_protocol(protocol)?;
    embedding.set_host(host)?;
    embedding.set_port(port)?;
    embedding.set_model(model)?;

    Ok(())
}

fn configure_chat(chat: &mut ChatConfig) -> Result<()> {
    let providers = [ChatProviderKind::Ollama, ChatProviderKind::OpenAi];
    let labels: Vec<String> = providers.iter().map(ToString::to_string).collect();
    let default_index = providers
        .iter()
        .position(|&p| p == chat.provider)
        .unwrap_or(0);

    let provider = providers[Select::new()
        .with_prompt("Chat provider")
        .default(default_index)
        .items(&labels)
        .interact()?];

    if provider == ChatProviderKind::OpenAi {
        let api_key_env: String = Input::new()
            .with_prompt("Environment variable holding the API key")
            .default(chat.api_key_env.clone())
            .validate_with(non_empty("Variable name"))
            .interact_text()?;
        chat.api_key_env = api_key_env;
    }

    let base_url: String = Input::new()
        .with_prompt("Chat base URL")
        .default(chat.base_url_for(provider).to_string())
        .validate_with(|input: &String| -> Result<(), String> {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("Invalid URL: {}", e))
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(chat.model.clone())
        .validate_with(non_empty("Model name"))
        .interact_text()?;

    chat.set_provider(provider)?;
    chat.set_base_url(provider, base_url)?;
    chat.set_model(model)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingSettings) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingSettings {
                chunk_size: *input,
                overlap: 0,
            }
            .validate()
        })
        .interact_text()?;

    let overlap: usize = Input::new()
        .with_prompt("Overlap (characters)")
        .default(chunking.overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingSettings {
                chunk_size,
                overlap: *input,
            }
            .validate()
        })
        .interact_text()?;

    *chunking = ChunkingSettings {
        chunk_size,
        overlap,
    };
    Ok(())
}

fn configure_store(config: &mut Config) -> Result<()> {
    let backends = [StoreBackend::Sqlite, StoreBackend::Memory];
    let backend_index = Select::new()
        .with_prompt("Chunk store")
        .default(
            backends
                .iter()
                .position(|&b| b == config.store.backend)
                .unwrap_or(0),
        )
        .items(&["sqlite (kept on disk)", "memory (lost on exit)"])
        .interact()?;

    let modes = [IndexingMode::Atomic, IndexingMode::Incremental];
    let mode_index = Select::new()
        .with_prompt("Indexing mode")
        .default(
            modes
                .iter()
                .position(|&m| m == config.store.indexing_mode)
                .unwrap_or(0),
        )
        .items(&[
            "atomic (swap in the new document when done)",
            "incremental (store chunks as they are embedded)",
        ])
        .interact()?;

    config.store.backend = backends[backend_index];
    config.store.indexing_mode = modes[mode_index];
    Ok(())
}

fn non_empty(what: &'static str) -> impl Fn(&String) -> Result<(), String> {
    move |input: &String| {
        if input.trim().is_empty() {
            Err(format!("{} cannot be empty", what))
        } else {
            Ok(())
        }
    }
}

fn test_embedding_connection(embedding: &EmbeddingConfig) -> bool {
    OllamaClient::new(embedding)
        .map(|client| client.with_timeout(std::time::Duration::from_secs(5)))
        .and_then(|client| client.ping())
        .is_ok()
}
