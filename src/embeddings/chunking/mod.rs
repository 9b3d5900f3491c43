#[cfg(test)]
mod tests;

use tracing::debug;

use crate::config::ChunkingSettings;
use crate::extract::ExtractedDocument;

/// A raw window over the source text, before whitespace filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Offset of the first character, counted in characters
    pub start: usize,
    pub text: String,
}

/// Represents a chunk of text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// 1-based page the chunk came from, when the document is paginated
    pub page_number: Option<u32>,
}

/// Slide a window of `chunk_size` characters over `text`, advancing by
/// `chunk_size - overlap` each step.
///
/// The step is clamped to at least one character so every input terminates,
/// and the last window may be shorter than `chunk_size`.
#[inline]
pub fn sliding_windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<Window> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut windows = Vec::with_capacity(chars.len().div_ceil(step));
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        windows.push(Window {
            start,
            text: chars[start..end].iter().collect(),
        });
        start += step;
    }

    windows
}

/// Chunk one page (or an unpaginated text), dropping whitespace-only windows
#[inline]
pub fn chunk_text(
    text: &str,
    page_number: Option<u32>,
    settings: &ChunkingSettings,
) -> Vec<TextChunk> {
    sliding_windows(text, settings.chunk_size, settings.overlap)
        .into_iter()
        .filter(|window| !window.text.trim().is_empty())
        .map(|window| TextChunk {
            text: window.text,
            page_number,
        })
        .collect()
}

/// Chunk an extracted document.
///
/// Paginated documents are chunked page by page so that no window straddles a
/// page boundary. Without page information the whole text is page 1.
#[inline]
pub fn chunk_document(document: &ExtractedDocument, settings: &ChunkingSettings) -> Vec<TextChunk> {
    let chunks: Vec<TextChunk> = match &document.pages {
        Some(pages) => pages
            .iter()
            .flat_map(|page| chunk_text(&page.text, Some(page.number), settings))
            .collect(),
        None => chunk_text(&document.text, Some(1), settings),
    };

    debug!(
        "Chunked document into {} chunks (chunk_size={}, overlap={})",
        chunks.len(),
        settings.chunk_size,
        settings.overlap
    );

    chunks
}
