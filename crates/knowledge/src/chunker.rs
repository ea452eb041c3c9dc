//! Word-window chunking with configurable size and overlap.

use crate::parser::ParsedDocument;
use crate::types::ChunkCandidate;

/// Split text into overlapping windows of `chunk_size` words.
///
/// Consecutive windows share `overlap` words. An overlap that is not smaller
/// than the window is ignored. The final window always ends at the last word.
pub fn chunk_words(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    page: Option<u32>,
    first_position: u32,
) -> Vec<ChunkCandidate> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = if overlap < chunk_size {
        chunk_size - overlap
    } else {
        chunk_size
    };

    let mut chunks = Vec::new();
    let mut position = first_position;
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(words.len());

        chunks.push(ChunkCandidate {
            position,
            text: words[start..end].join(" "),
            start_word: start,
            page,
        });
        position += 1;

        if end == words.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Chunk every page of a parsed document, numbering positions across pages.
pub fn chunk_document(
    document: &ParsedDocument,
    chunk_size: usize,
    overlap: usize,
) -> Vec<ChunkCandidate> {
    let paginated = document.pages.len() > 1;
    let mut chunks: Vec<ChunkCandidate> = Vec::new();

    for page in &document.pages {
        let page_number = if paginated { Some(page.number) } else { None };
        let next_position = chunks.len() as u32;
        chunks.extend(chunk_words(
            &page.text,
            chunk_size,
            overlap,
            page_number,
            next_position,
        ));
    }

    tracing::debug!(
        "Chunked document into {} chunks (size: {} words, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}
