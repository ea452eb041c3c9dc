//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Knowledge base identifier (UUID)
    pub name: String,

    /// Embedding provider ("trigram" or "ollama")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Embedding model
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding provider endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Chunk size in words
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between consecutive chunks, in words
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: u32,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_chunk_size() -> u32 {
    200
}

fn default_chunk_overlap() -> u32 {
    40
}

fn default_embedding_dim() -> u32 {
    384
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: default_provider(),
            model: default_model(),
            endpoint: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

/// An indexed unit of document content. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,

    /// Owning document ID
    pub document_id: String,

    /// Position within the document
    pub position: u32,

    pub content: String,

    /// Embedding vector
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,

    /// `source_document`, `page`, `start_word`
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Chunk {
    /// Name of the source document, falling back to the document ID.
    pub fn source_document(&self) -> &str {
        self.metadata
            .get("source_document")
            .and_then(|v| v.as_str())
            .unwrap_or(self.document_id.as_str())
    }

    /// 1-based page number, when the source was paginated.
    pub fn page(&self) -> Option<u32> {
        self.metadata
            .get("page")
            .and_then(|v| v.as_u64())
            .and_then(|p| u32::try_from(p).ok())
    }
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A source document row in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,

    /// Source file path as given at ingestion
    pub path: String,

    /// Hex SHA-256 of the raw file contents
    pub content_hash: String,

    pub content_type: String,

    pub ingested_at: DateTime<Utc>,

    pub size_bytes: u64,
}

/// Options for the ingest operation.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Knowledge base ID
    pub kb_id: String,

    /// Files or directories to ingest
    pub paths: Vec<PathBuf>,

    /// Substring include patterns (empty means everything)
    pub include: Vec<String>,

    /// Substring exclude patterns
    pub exclude: Vec<String>,

    /// Reset the base before ingesting
    pub reset: bool,
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub documents_count: u32,

    /// Documents left untouched because their hash did not change
    pub skipped_count: u32,

    pub chunks_count: u32,

    pub bytes_processed: u64,

    pub duration_secs: f64,
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    pub kb_id: String,
    pub documents_count: u32,
    pub chunks_count: u32,
    pub db_size_bytes: u64,
    pub last_ingested_at: Option<DateTime<Utc>>,
}

/// Chunk produced by the chunker, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub position: u32,
    pub text: String,
    pub start_word: usize,
    pub page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_metadata_accessors() {
        let chunk = Chunk {
            id: "c1".to_string(),
            document_id: "d1".to_string(),
            position: 0,
            content: "Warranty is 2 years".to_string(),
            embedding: vec![],
            metadata: serde_json::json!({ "source_document": "warranty.pdf", "page": 4 }),
        };

        assert_eq!(chunk.source_document(), "warranty.pdf");
        assert_eq!(chunk.page(), Some(4));
    }

    #[test]
    fn test_chunk_without_metadata_falls_back() {
        let chunk = Chunk {
            id: "c1".to_string(),
            document_id: "d1".to_string(),
            position: 0,
            content: String::new(),
            embedding: vec![],
            metadata: serde_json::Value::Null,
        };

        assert_eq!(chunk.source_document(), "d1");
        assert_eq!(chunk.page(), None);
    }

    #[test]
    fn test_config_defaults_from_partial_yaml() {
        let config: KnowledgeBaseConfig = serde_yaml::from_str("name: kb\nchunk_size: 64\n").unwrap();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.chunk_overlap, 40);
    }
}
