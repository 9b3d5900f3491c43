use super::ScoredChunk;

/// Divider placed between chunks in the assembled context
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Join ranked chunks into the context block handed to the chat model.
///
/// Chunks with a page number are prefixed with `[Page N]` so answers can cite
/// it. No chunks yields an empty string.
#[inline]
pub fn assemble_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|scored| match scored.chunk.page_number {
            Some(page) => format!("[Page {}]\n{}", page, scored.chunk.text),
            None => scored.chunk.text.clone(),
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
