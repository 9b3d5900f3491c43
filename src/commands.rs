use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::{ChatProviderKind, Config, StoreBackend};
use crate::database::{DocumentSummary, open_index};
use crate::embeddings::OllamaClient;
use crate::extract::extractor_for;
use crate::indexer::{DocumentUpload, IndexEvent, Indexer};
use crate::providers::Providers;
use crate::query::{QueryAnswer, QueryEngine, QueryRequest};
use crate::server::{self, AppState};

fn warn_if_ephemeral(config: &Config) {
    if config.store.backend == StoreBackend::Memory {
        warn!("The memory store only lives as long as this process");
        eprintln!(
            "Note: the memory store is not persisted; use `serve` or switch to the sqlite backend."
        );
    }
}

/// Index a local file, drawing a progress bar while chunks are embedded
#[inline]
pub async fn index_document(
    config: &Config,
    file: &Path,
    embedding_model: Option<&str>,
) -> Result<usize> {
    warn_if_ephemeral(config);

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let upload = DocumentUpload::new(&file.to_string_lossy(), None, bytes)?;
    let extractor = extractor_for(&upload.filename, None)?;
    let embedder = Providers::from_config(config).embedder(embedding_model)?;
    let index = open_index(config).await?;
    let indexer = Indexer::from_config(config, index);

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("=> "),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Extracting {}", upload.filename));

    let filename = upload.filename.clone();
    let mut events = std::pin::pin!(indexer.index(upload, extractor, embedder));
    while let Some(event) = events.next().await {
        match event {
            IndexEvent::Parsing => bar.tick(),
            IndexEvent::Progress { current, total } => {
                bar.set_length(total as u64);
                bar.set_position(current as u64);
                bar.set_message("Embedding chunks");
            }
            IndexEvent::Complete {
                indexed_count,
                message,
            } => {
                bar.finish_and_clear();
                match message {
                    Some(message) => println!("{}: {}", filename, message),
                    None => println!("Indexed {} chunks from {}", indexed_count, filename),
                }
                return Ok(indexed_count);
            }
            IndexEvent::Error { message } => {
                bar.abandon();
                return Err(anyhow!(message));
            }
        }
    }

    Err(anyhow!("Indexing of {} ended without a result", filename))
}

/// Ask one question about the active document
#[inline]
pub async fn ask(
    config: &Config,
    message: &str,
    provider: Option<ChatProviderKind>,
    model: Option<&str>,
    embedding_model: Option<&str>,
) -> Result<QueryAnswer> {
    warn_if_ephemeral(config);

    let providers = Providers::from_config(config);
    let chat = providers.chat(provider, model)?;
    let index = open_index(config).await?;

    if index.active_document().await?.is_none() {
        eprintln!("No document has been indexed yet; the answer will have no context.");
    }

    let engine = QueryEngine::from_config(config, index);
    let embedder = engine.embedder_for(&providers, embedding_model).await?;
    let answer = engine
        .answer(&QueryRequest::new(message), embedder.as_ref(), chat.as_ref())
        .await?;

    println!("{}", answer.reply);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            match source.page_number {
                Some(page) => println!(
                    "  chunk {} (page {}, score {:.3})",
                    source.index, page, source.score
                ),
                None => println!("  chunk {} (score {:.3})", source.index, source.score),
            }
        }
    }

    Ok(answer)
}

/// Run the HTTP server
#[inline]
pub async fn serve(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("Invalid listen address {}", host))?;

    let index = open_index(config).await?;
    let state = AppState::new(config, index);

    info!("Starting server with {:?} store", config.store.backend);
    server::serve(
        state,
        SocketAddr::new(ip, port),
        config.server.max_upload_bytes,
    )
    .await
}

fn describe_document(summary: Option<&DocumentSummary>) -> String {
    summary.map_or_else(
        || "No document indexed".to_string(),
        |doc| {
            format!(
                "{} ({} chunks, indexed {}{})",
                doc.name,
                doc.chunk_count,
                doc.indexed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                doc.embedding_model
                    .as_deref()
                    .map(|model| format!(" with {}", model))
                    .unwrap_or_default()
            )
        },
    )
}

/// Report provider reachability and the active document
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 PDF RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedding Provider:");
    let embedding = config.embedding.clone();
    let health = tokio::task::spawn_blocking(move || {
        OllamaClient::new(&embedding).and_then(|client| client.health_check())
    })
    .await
    .context("Health check task failed")?;
    match health {
        Ok(()) => println!(
            "   ✅ Connected ({}:{}), model {}",
            config.embedding.host, config.embedding.port, config.embedding.model
        ),
        Err(e) => println!("   ❌ {}", e),
    }

    println!();
    println!("💬 Chat Provider:");
    match Providers::from_config(config).chat(None, None) {
        Ok(chat) => println!(
            "   ✅ {} at {} with model {}",
            chat.name(),
            config.chat.base_url_for(config.chat.provider),
            chat.model()
        ),
        Err(e) => println!("   ❌ {}", e),
    }

    println!();
    println!("🗄️  Chunk Store ({:?}):", config.store.backend);
    match open_index(config).await {
        Ok(index) => match index.active_document().await {
            Ok(summary) => println!("   📄 {}", describe_document(summary.as_ref())),
            Err(e) => println!("   ❌ {}", e),
        },
        Err(e) => println!("   ❌ Failed to open - {}", e),
    }

    Ok(())
}
