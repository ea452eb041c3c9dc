//! Vector index abstraction for knowledge chunks.

use crate::types::{Chunk, DocumentRecord, ScoredChunk};
use grounded_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Upserting documents and chunks with embeddings
/// - Searching for similar vectors (top-k)
/// - Collecting statistics
/// - Resetting/clearing the index
pub trait VectorIndex: Send {
    /// Insert or replace a source document row.
    fn upsert_document(&mut self, document: &DocumentRecord) -> AppResult<()>;

    /// Insert or replace a chunk with its embedding.
    fn upsert_chunk(&mut self, chunk: &Chunk) -> AppResult<()>;

    /// Remove a document and all of its chunks.
    fn remove_document(&mut self, document_id: &str) -> AppResult<()>;

    /// Look up a document by its source path.
    fn find_document_by_path(&self, path: &str) -> AppResult<Option<DocumentRecord>>;

    /// Search for the top-k most similar chunks to the query embedding.
    ///
    /// Returns chunks ordered by descending similarity score.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>>;

    /// Returns (documents_count, chunks_count).
    fn stats(&self) -> AppResult<(u32, u32)>;

    /// Reset the index, removing all chunks and documents.
    fn reset(&mut self) -> AppResult<()>;
}
