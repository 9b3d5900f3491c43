// Indexer module
// Turns an uploaded document into embedded chunks, reporting progress as it goes

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{ChunkingSettings, Config, IndexingMode};
use crate::database::{Chunk, VectorIndex};
use crate::embeddings::{EmbeddingProvider, chunk_document};
use crate::extract::{TextExtractor, extract_blocking};
use crate::{RagError, Result};

/// Completion message for a document without any extractable text
pub const NO_TEXT_MESSAGE: &str = "No text found in document";

/// A document received for indexing
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl DocumentUpload {
    /// Build an upload, keeping only the final path component of `filename`
    #[inline]
    pub fn new(
        filename: &str,
        content_type: Option<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<Self> {
        let filename = Path::new(filename.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RagError::Input("Uploaded file has no name".to_string()))?;

        Ok(Self {
            filename,
            content_type,
            bytes: bytes.into(),
        })
    }
}

/// One status record of an indexing run, sent to clients as a line of NDJSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IndexEvent {
    Parsing,
    Progress {
        current: usize,
        total: usize,
    },
    Complete {
        indexed_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        message: String,
    },
}

impl IndexEvent {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Serialize as a single newline-terminated JSON record
    #[inline]
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","message":"Failed to encode event: {}"}}"#,
                e
            )
        });
        line.push('\n');
        line
    }
}

impl From<RagError> for IndexEvent {
    #[inline]
    fn from(error: RagError) -> Self {
        Self::Error {
            message: error.to_string(),
        }
    }
}

/// Runs indexing against one vector index.
///
/// Chunks are embedded one at a time, never in parallel, so a local
/// embedding provider sees at most one request from a run.
#[derive(Clone)]
pub struct Indexer {
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingSettings,
    mode: IndexingMode,
}

impl Indexer {
    #[inline]
    pub fn new(index: Arc<dyn VectorIndex>, chunking: ChunkingSettings, mode: IndexingMode) -> Self {
        Self {
            index,
            chunking,
            mode,
        }
    }

    #[inline]
    pub fn from_config(config: &Config, index: Arc<dyn VectorIndex>) -> Self {
        Self::new(index, config.chunking.clone(), config.store.indexing_mode)
    }

    #[inline]
    pub fn index_handle(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Index `upload`, yielding status events as work completes.
    ///
    /// Nothing happens until the stream is polled. The last event is always
    /// `Complete` or `Error`. Dropping the stream stops the run before the next
    /// provider call.
    #[inline]
    pub fn index(
        &self,
        upload: DocumentUpload,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> impl Stream<Item = IndexEvent> + Send + 'static {
        let filename = upload.filename.clone();
        self.run(upload, extractor, embedder).map(move |event| {
            event.unwrap_or_else(|e| {
                error!("Indexing {} failed: {}", filename, e);
                IndexEvent::from(e)
            })
        })
    }

    fn run(
        &self,
        upload: DocumentUpload,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> impl Stream<Item = Result<IndexEvent>> + Send + 'static {
        let index = Arc::clone(&self.index);
        let chunking = self.chunking.clone();
        let mode = self.mode;

        try_stream! {
            let DocumentUpload { filename, bytes, .. } = upload;
            let model = embedder.model().to_string();
            info!(
                "Indexing {} ({} bytes) with model {}",
                filename,
                bytes.len(),
                model
            );
            yield IndexEvent::Parsing;

            let document = extract_blocking(extractor, bytes).await?;
            let pieces = chunk_document(&document, &chunking);

            if pieces.is_empty() {
                index.replace_all(&filename, &model, Vec::new()).await?;
                info!("{} contains no text", filename);
                yield IndexEvent::Complete {
                    indexed_count: 0,
                    message: Some(NO_TEXT_MESSAGE.to_string()),
                };
                return;
            }

            let total = pieces.len();
            if mode == IndexingMode::Incremental {
                index.replace_all(&filename, &model, Vec::new()).await?;
            }

            let mut buffered = Vec::with_capacity(if mode == IndexingMode::Atomic { total } else { 0 });
            let mut dimension = None;

            for (position, piece) in pieces.into_iter().enumerate() {
                let embedding = embedder.embed(&piece.text).await?;
                check_dimension(&mut dimension, embedding.len(), position)?;
                debug!("Embedded chunk {}/{} of {}", position + 1, total, filename);

                let chunk = Chunk {
                    document: filename.clone(),
                    index: position,
                    page_number: piece.page_number,
                    text: piece.text,
                    embedding,
                };
                match mode {
                    IndexingMode::Atomic => buffered.push(chunk),
                    IndexingMode::Incremental => index.insert_incremental(chunk).await?,
                }

                yield IndexEvent::Progress {
                    current: position + 1,
                    total,
                };
            }

            if mode == IndexingMode::Atomic {
                index.replace_all(&filename, &model, buffered).await?;
            }

            info!("Indexed {} chunks of {}", total, filename);
            yield IndexEvent::Complete {
                indexed_count: total,
                message: None,
            };
        }
    }
}

fn check_dimension(expected: &mut Option<usize>, actual: usize, position: usize) -> Result<()> {
    match *expected {
        None => {
            *expected = Some(actual);
            Ok(())
        }
        Some(dimension) if dimension == actual => Ok(()),
        Some(dimension) => Err(RagError::Provider(format!(
            "Embedding for chunk {} has {} dimensions but earlier chunks have {}",
            position, actual, dimension
        ))),
    }
}
