// Server module
// HTTP surface for uploading a document and chatting about it

mod errors;
mod handlers;


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::VectorIndex;
use crate::indexer::Indexer;
use crate::providers::Providers;
use crate::query::QueryEngine;

pub use errors::ErrorBody;

/// Shared handler state; cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<dyn VectorIndex>,
    pub indexer: Indexer,
    pub engine: QueryEngine,
    pub providers: Providers,
}

impl AppState {
    #[inline]
    pub fn new(config: &Config, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            indexer: Indexer::from_config(config, Arc::clone(&index)),
            engine: QueryEngine::from_config(config, Arc::clone(&index)),
            providers: Providers::from_config(config),
            index,
        }
    }
}

#[inline]
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/document", get(handlers::document))
        .route("/api/upload", post(handlers::upload))
        .route("/api/chat", post(handlers::chat))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Serve until Ctrl-C
#[inline]
pub async fn serve(state: AppState, addr: SocketAddr, max_upload_bytes: usize) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state, max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
