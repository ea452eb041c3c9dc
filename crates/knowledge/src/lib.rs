//! Knowledge base management for Grounded.
//!
//! Local-first storage of chunked, embedded documents in one SQLite index per
//! knowledge base, plus the ingestion helper used to populate it.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod parser;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{EmbeddingEngine, EmbeddingProvider};
pub use index::SqliteIndex;
pub use types::{
    BaseStats, Chunk, DocumentRecord, IngestOptions, IngestStats, KnowledgeBaseConfig,
    ScoredChunk,
};
pub use vector_index::VectorIndex;

use chrono::Utc;
use grounded_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Ingest files into a knowledge base, creating it if needed.
///
/// Unchanged files (same path and SHA-256) are skipped; changed files replace
/// their previous chunks.
pub async fn ingest(workspace: &Path, options: IngestOptions) -> AppResult<IngestStats> {
    let start = Instant::now();
    config::ensure_valid_kb_id(&options.kb_id)?;

    tracing::info!("Starting ingest for knowledge base '{}'", options.kb_id);

    let kb_config = config::load_config(workspace, &options.kb_id)?;
    config::save_config(workspace, &kb_config)?;

    let mut index = SqliteIndex::open(&config::get_index_path(workspace, &options.kb_id))?;
    if options.reset {
        tracing::info!("Resetting knowledge base before ingest");
        index.reset()?;
    }

    let engine = EmbeddingEngine::new(workspace.to_path_buf());
    let mut stats = IngestStats::default();

    for path in collect_files(&options) {
        match ingest_file(&mut index, &engine, &kb_config, &path).await {
            Ok(Some((chunks, bytes))) => {
                stats.documents_count += 1;
                stats.chunks_count += chunks;
                stats.bytes_processed += bytes;
            }
            Ok(None) => stats.skipped_count += 1,
            Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
        }
    }

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingest completed: {} documents ({} unchanged), {} chunks, {} bytes in {:.2}s",
        stats.documents_count,
        stats.skipped_count,
        stats.chunks_count,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

fn collect_files(options: &IngestOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in &options.paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| should_include(p, options)),
            );
        } else {
            tracing::warn!("Path does not exist: {:?}", path);
        }
    }

    files
}

/// Returns `None` when the file is unchanged since the last ingest.
async fn ingest_file(
    index: &mut SqliteIndex,
    engine: &EmbeddingEngine,
    kb_config: &KnowledgeBaseConfig,
    path: &Path,
) -> AppResult<Option<(u32, u64)>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;
    let content_hash = format!("{:x}", Sha256::digest(raw.as_bytes()));
    let path_key = path.to_string_lossy().to_string();

    if let Some(existing) = index.find_document_by_path(&path_key)? {
        if existing.content_hash == content_hash {
            tracing::debug!("Unchanged, skipping: {:?}", path);
            return Ok(None);
        }
        index.remove_document(&existing.id)?;
    }

    let parsed = parser::parse_text(path, &raw)?;
    if parsed.is_empty() {
        return Err(AppError::Knowledge("No text content".to_string()));
    }

    let candidates = chunker::chunk_document(
        &parsed,
        kb_config.chunk_size as usize,
        kb_config.chunk_overlap as usize,
    );
    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let embeddings = engine.embed_texts(&kb_config.name, &texts).await?;

    let document = DocumentRecord {
        id: uuid::Uuid::new_v4().to_string(),
        path: path_key,
        content_hash,
        content_type: parsed.content_type.as_str().to_string(),
        ingested_at: Utc::now(),
        size_bytes: raw.len() as u64,
    };
    index.upsert_document(&document)?;

    let source_document = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| document.path.clone());

    for (candidate, embedding) in candidates.into_iter().zip(embeddings) {
        let mut metadata = serde_json::json!({
            "source_document": source_document,
            "start_word": candidate.start_word,
        });
        if let Some(page) = candidate.page {
            metadata["page"] = serde_json::json!(page);
        }

        index.upsert_chunk(&Chunk {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            position: candidate.position,
            content: candidate.text,
            embedding,
            metadata,
        })?;
    }

    tracing::debug!("Ingested {:?}: {} chunks", path, texts.len());

    Ok(Some((texts.len() as u32, document.size_bytes)))
}

/// Substring include/exclude filter; excludes win.
fn should_include(path: &Path, options: &IngestOptions) -> bool {
    let path_str = path.to_string_lossy();

    if options.exclude.iter().any(|p| path_str.contains(p.as_str())) {
        return false;
    }

    options.include.is_empty() || options.include.iter().any(|p| path_str.contains(p.as_str()))
}

/// Remove every document and chunk from a knowledge base.
pub fn clean(workspace: &Path, kb_id: &str) -> AppResult<()> {
    config::ensure_valid_kb_id(kb_id)?;
    tracing::info!("Cleaning knowledge base '{}'", kb_id);

    let mut index = open_base(workspace, kb_id)?;
    index.reset()?;

    tracing::info!("Knowledge base '{}' cleaned", kb_id);
    Ok(())
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, kb_id: &str) -> AppResult<BaseStats> {
    config::ensure_valid_kb_id(kb_id)?;

    let index = open_base(workspace, kb_id)?;
    let (documents_count, chunks_count) = index.stats()?;
    let db_size_bytes = std::fs::metadata(config::get_index_path(workspace, kb_id))
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(BaseStats {
        kb_id: kb_id.to_string(),
        documents_count,
        chunks_count,
        db_size_bytes,
        last_ingested_at: index.last_ingested_at()?,
    })
}

fn open_base(workspace: &Path, kb_id: &str) -> AppResult<SqliteIndex> {
    if !config::base_exists(workspace, kb_id) {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            kb_id
        )));
    }
    SqliteIndex::open_existing(&config::get_index_path(workspace, kb_id))
}
