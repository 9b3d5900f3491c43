// Extract module
// Turns uploaded bytes into text, keeping page boundaries when the format has them


use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{RagError, Result};

/// Page separator emitted by the PDF text extractor
const PAGE_BREAK: char = '\u{c}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub pages: Option<Vec<Page>>,
}

impl ExtractedDocument {
    #[inline]
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument>;
}

/// Split extracted text on form feeds into numbered pages.
///
/// Text without any page break is returned without page information.
#[inline]
pub fn split_pages(text: &str) -> Option<Vec<Page>> {
    if !text.contains(PAGE_BREAK) {
        return None;
    }

    let mut pages: Vec<Page> = text
        .split(PAGE_BREAK)
        .zip(1u32..)
        .map(|(page_text, number)| Page {
            number,
            text: page_text.to_string(),
        })
        .collect();

    // A trailing break ends the last page rather than starting a new one
    if pages.len() > 1 && pages.last().is_some_and(|page| page.text.trim().is_empty()) {
        pages.pop();
    }

    Some(pages)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    #[inline]
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| RagError::Extraction(format!("Failed to extract PDF text: {}", e)))?;
        let pages = split_pages(&text);

        debug!(
            "Extracted {} characters from PDF ({} pages)",
            text.len(),
            pages.as_ref().map_or(1, Vec::len)
        );

        Ok(ExtractedDocument { text, pages })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    #[inline]
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        Ok(ExtractedDocument { text, pages: None })
    }
}

/// Pick an extractor from the upload's file name, falling back to its
/// content type.
#[inline]
pub fn extractor_for(
    filename: &str,
    content_type: Option<&str>,
) -> Result<Arc<dyn TextExtractor>> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match (extension.as_deref(), content_type) {
        (Some("pdf"), _) | (_, Some("application/pdf")) => Ok(Arc::new(PdfExtractor)),
        (Some("txt" | "md" | "markdown"), _) => Ok(Arc::new(PlainTextExtractor)),
        (_, Some(mime)) if mime.starts_with("text/") => Ok(Arc::new(PlainTextExtractor)),
        _ => {
            warn!("Rejected upload {} ({:?})", filename, content_type);
            Err(RagError::Input(format!(
                "Unsupported document type for '{}'; upload a PDF or a text file",
                filename
            )))
        }
    }
}

/// Run an extractor off the async runtime.
///
/// A panic inside the parser is reported as an extraction error instead of
/// taking the caller down with it.
#[inline]
pub async fn extract_blocking(
    extractor: Arc<dyn TextExtractor>,
    bytes: Arc<[u8]>,
) -> Result<ExtractedDocument> {
    tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        .await
        .map_err(|e| {
            if e.is_panic() {
                RagError::Extraction("The document parser crashed on this file".to_string())
            } else {
                RagError::Extraction(format!("Extraction task failed: {}", e))
            }
        })?
}
