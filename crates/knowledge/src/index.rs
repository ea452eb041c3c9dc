//! SQLite-backed vector index for knowledge chunks.
//!
//! Embeddings are stored as little-endian `f32` blobs and scored with cosine
//! similarity at query time. One database file per knowledge base.

use crate::types::{Chunk, DocumentRecord, ScoredChunk};
use crate::vector_index::VectorIndex;
use chrono::{DateTime, Utc};
use grounded_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Initialize the SQLite index database, creating it if needed.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            content_hash TEXT NOT NULL,
            content_type TEXT NOT NULL,
            ingested_at TEXT NOT NULL,
            size_bytes INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT,
            FOREIGN KEY (document_id) REFERENCES documents(id)
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

pub fn insert_document(conn: &Connection, document: &DocumentRecord) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO documents (id, path, content_hash, content_type, ingested_at, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            document.id,
            document.path,
            document.content_hash,
            document.content_type,
            document.ingested_at.to_rfc3339(),
            document.size_bytes as i64,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert document: {}", e)))?;

    Ok(())
}

pub fn insert_chunk(conn: &Connection, chunk: &Chunk) -> AppResult<()> {
    if chunk.embedding.is_empty() {
        return Err(AppError::Knowledge(format!(
            "Chunk {} is missing its embedding",
            chunk.id
        )));
    }

    let metadata_json = serde_json::to_string(&chunk.metadata)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize metadata: {}", e)))?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, document_id, position, content, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.id,
            chunk.document_id,
            chunk.position as i64,
            chunk.content,
            embedding_to_bytes(&chunk.embedding),
            metadata_json,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

pub fn delete_document(conn: &Connection, document_id: &str) -> AppResult<()> {
    conn.execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;
    conn.execute("DELETE FROM documents WHERE id = ?1", params![document_id])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete document: {}", e)))?;
    Ok(())
}

pub fn find_document_by_path(conn: &Connection, path: &str) -> AppResult<Option<DocumentRecord>> {
    let row = conn
        .query_row(
            "SELECT id, path, content_hash, content_type, ingested_at, size_bytes
             FROM documents WHERE path = ?1",
            params![path],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()
        .map_err(|e| AppError::Knowledge(format!("Failed to look up document: {}", e)))?;

    row.map(|(id, path, content_hash, content_type, ingested_at, size_bytes)| {
        Ok(DocumentRecord {
            id,
            path,
            content_hash,
            content_type,
            ingested_at: parse_timestamp(&ingested_at)?,
            size_bytes: size_bytes.max(0) as u64,
        })
    })
    .transpose()
}

/// Query the index for the top-k most similar chunks.
///
/// Ties are broken by chunk ID so results are stable across runs.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<ScoredChunk>> {
    if top_k == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare("SELECT id, document_id, position, content, embedding, metadata FROM chunks")
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            let metadata_json: Option<String> = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                embedding_bytes,
                metadata_json,
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (id, document_id, position, content, embedding_bytes, metadata_json) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk row: {}", e)))?;

        let embedding = bytes_to_embedding(&embedding_bytes)?;
        let metadata = match metadata_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| AppError::Knowledge(format!("Corrupt chunk metadata: {}", e)))?,
            None => serde_json::Value::Null,
        };

        let score = cosine_similarity(query_embedding, &embedding);
        let score = if score.is_nan() { 0.0 } else { score };
        results.push(ScoredChunk {
            chunk: Chunk {
                id,
                document_id,
                position: position.max(0) as u32,
                content,
                embedding,
                metadata,
            },
            score,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Returns (documents_count, chunks_count).
pub fn get_stats(conn: &Connection) -> AppResult<(u32, u32)> {
    let count = |sql: &str| -> AppResult<u32> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|v| v.max(0) as u32)
            .map_err(|e| AppError::Knowledge(format!("Failed to count rows: {}", e)))
    };

    Ok((
        count("SELECT COUNT(*) FROM documents")?,
        count("SELECT COUNT(*) FROM chunks")?,
    ))
}

/// Most recent document ingestion time.
pub fn last_ingested_at(conn: &Connection) -> AppResult<Option<DateTime<Utc>>> {
    let latest: Option<String> = conn
        .query_row("SELECT MAX(ingested_at) FROM documents", [], |row| row.get(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to read ingestion time: {}", e)))?;

    latest.as_deref().map(parse_timestamp).transpose()
}

/// Delete all data.
pub fn reset_index(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("DELETE FROM chunks; DELETE FROM documents;")
        .map_err(|e| AppError::Knowledge(format!("Failed to reset index: {}", e)))?;

    tracing::info!("Reset knowledge base index");
    Ok(())
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Knowledge(format!("Invalid timestamp '{}': {}", value, e)))
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity; 0.0 for mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// [`VectorIndex`] over one SQLite file.
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Open the index, creating the file and schema if needed.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        Ok(Self {
            conn: init_index(db_path)?,
        })
    }

    /// Open an index that must already exist.
    pub fn open_existing(db_path: &Path) -> AppResult<Self> {
        if !db_path.exists() {
            return Err(AppError::Knowledge(format!(
                "Index not found at {:?}",
                db_path
            )));
        }
        Self::open(db_path)
    }

    pub fn last_ingested_at(&self) -> AppResult<Option<DateTime<Utc>>> {
        last_ingested_at(&self.conn)
    }
}

impl VectorIndex for SqliteIndex {
    fn upsert_document(&mut self, document: &DocumentRecord) -> AppResult<()> {
        insert_document(&self.conn, document)
    }

    fn upsert_chunk(&mut self, chunk: &Chunk) -> AppResult<()> {
        insert_chunk(&self.conn, chunk)
    }

    fn remove_document(&mut self, document_id: &str) -> AppResult<()> {
        delete_document(&self.conn, document_id)
    }

    fn find_document_by_path(&self, path: &str) -> AppResult<Option<DocumentRecord>> {
        find_document_by_path(&self.conn, path)
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>> {
        query_chunks(&self.conn, query_embedding, top_k)
    }

    fn stats(&self) -> AppResult<(u32, u32)> {
        get_stats(&self.conn)
    }

    fn reset(&mut self) -> AppResult<()> {
        reset_index(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn document(id: &str, path: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            path: path.to_string(),
            content_hash: "abc".to_string(),
            content_type: "text".to_string(),
            ingested_at: Utc::now(),
            size_bytes: 100,
        }
    }

    fn chunk(id: &str, document_id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: document_id.to_string(),
            position: 0,
            content: "test text".to_string(),
            embedding,
            metadata: serde_json::json!({ "source_document": "notes.txt" }),
        }
    }

    #[test]
    fn test_init_index() {
        let temp = TempDir::new().unwrap();
        let conn = init_index(&temp.path().join("kb/index.sqlite")).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(table_count >= 2);
    }

    #[test]
    fn test_insert_and_query() {
        let temp = TempDir::new().unwrap();
        let mut index = SqliteIndex::open(&temp.path().join("index.sqlite")).unwrap();

        index.upsert_document(&document("doc1", "notes.txt")).unwrap();
        index.upsert_chunk(&chunk("chunk1", "doc1", vec![1.0, 0.0, 0.0])).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "chunk1");
        assert_eq!(results[0].chunk.source_document(), "notes.txt");
        assert!((results[0].score - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_chunk_without_embedding_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut index = SqliteIndex::open(&temp.path().join("index.sqlite")).unwrap();
        assert!(index.upsert_chunk(&chunk("c", "d", vec![])).is_err());
    }

    #[test]
    fn test_remove_document_and_stats() {
        let temp = TempDir::new().unwrap();
        let mut index = SqliteIndex::open(&temp.path().join("index.sqlite")).unwrap();

        index.upsert_document(&document("doc1", "a.txt")).unwrap();
        index.upsert_document(&document("doc2", "b.txt")).unwrap();
        index.upsert_chunk(&chunk("c1", "doc1", vec![1.0, 0.0])).unwrap();
        index.upsert_chunk(&chunk("c2", "doc2", vec![0.0, 1.0])).unwrap();
        assert_eq!(index.stats().unwrap(), (2, 2));

        index.remove_document("doc1").unwrap();
        assert_eq!(index.stats().unwrap(), (1, 1));
        assert!(index.find_document_by_path("a.txt").unwrap().is_none());
        assert_eq!(
            index.find_document_by_path("b.txt").unwrap().unwrap().id,
            "doc2"
        );
        assert!(index.last_ingested_at().unwrap().is_some());

        index.reset().unwrap();
        assert_eq!(index.stats().unwrap(), (0, 0));
    }

    #[test]
    fn test_open_existing_requires_file() {
        let temp = TempDir::new().unwrap();
        assert!(SqliteIndex::open_existing(&temp.path().join("missing.sqlite")).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_bytes_reject_bad_length() {
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
        let bytes = embedding_to_bytes(&[0.5, -1.25]);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), vec![0.5, -1.25]);
    }
}
