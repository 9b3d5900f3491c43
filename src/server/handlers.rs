use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::AppState;
use super::errors::not_found;
use crate::chat::ChatMessage;
use crate::config::ChatProviderKind;
use crate::extract::extractor_for;
use crate::indexer::DocumentUpload;
use crate::query::{QueryAnswer, QueryRequest};
use crate::{RagError, Result};

const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Deserialize)]
pub(super) struct ChatBody {
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
    provider: Option<ChatProviderKind>,
    model: Option<String>,
    embedding_model: Option<String>,
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub(super) async fn document(State(state): State<AppState>) -> Result<Response> {
    Ok(match state.index.active_document().await? {
        Some(summary) => Json(summary).into_response(),
        None => not_found("No document has been indexed"),
    })
}

/// Accepts a multipart `file` (plus optional `embedding_model`) and streams
/// indexing progress back as NDJSON.
///
/// Problems found before streaming starts are ordinary error responses; after
/// that they arrive as the final `error` record.
pub(super) async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut file = None;
    let mut embedding_model = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RagError::Input(format!("Invalid upload: {}", e.body_text())))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| RagError::Input(format!("Invalid upload: {}", e.body_text())))?;
                file = Some(DocumentUpload::new(&filename, content_type, bytes.to_vec())?);
            }
            Some("embedding_model") => {
                let model = field
                    .text()
                    .await
                    .map_err(|e| RagError::Input(format!("Invalid upload: {}", e.body_text())))?;
                embedding_model = Some(model).filter(|m| !m.trim().is_empty());
            }
            other => debug!("Ignoring upload field {:?}", other),
        }
    }

    let upload = file.ok_or_else(|| RagError::Input("No file was uploaded".to_string()))?;
    let extractor = extractor_for(&upload.filename, upload.content_type.as_deref())?;
    let embedder = state.providers.embedder(embedding_model.as_deref())?;
    info!("Received {} ({} bytes)", upload.filename, upload.bytes.len());

    let lines = state
        .indexer
        .index(upload, extractor, embedder)
        .map(|event| Ok::<_, Infallible>(event.to_ndjson()));

    Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response())
}

pub(super) async fn chat(
    State(state): State<AppState>,
    body: std::result::Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<QueryAnswer>> {
    let Json(body) = body.map_err(|e| RagError::Input(e.body_text()))?;

    let embedder = state
        .engine
        .embedder_for(&state.providers, body.embedding_model.as_deref())
        .await?;
    let chat = state
        .providers
        .chat(body.provider, body.model.as_deref())?;
    let request = QueryRequest {
        message: body.message,
        history: body.history,
    };

    let answer = state
        .engine
        .answer(&request, embedder.as_ref(), chat.as_ref())
        .await?;
    Ok(Json(answer))
}
