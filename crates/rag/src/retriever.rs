//! Retrieval port and its SQLite-backed adapter.

use crate::config::PipelineConfig;
use crate::error::RetrievalError;
use async_trait::async_trait;
use grounded_knowledge::config::{base_exists, get_index_path};
use grounded_knowledge::{EmbeddingEngine, ScoredChunk, SqliteIndex, VectorIndex};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Finds the chunks of a knowledge base most relevant to a question.
///
/// Implementations return at most `top_k` chunks ordered by descending score
/// and never mutate the index.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        kb_id: &Uuid,
        question: &str,
    ) -> Result<Vec<ScoredChunk>, RetrievalError>;
}

/// Order by descending score, ties by chunk id. NaN scores count as zero.
pub fn rank_chunks(chunks: &mut Vec<ScoredChunk>, top_k: usize) {
    for scored in chunks.iter_mut() {
        if scored.score.is_nan() {
            scored.score = 0.0;
        }
    }
    chunks.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    chunks.truncate(top_k);
}

/// Embeds the question with the base's provider and scans its SQLite index.
pub struct IndexRetriever {
    workspace: PathBuf,
    engine: Arc<EmbeddingEngine>,
    top_k: usize,
    min_relevance_score: f32,
}

impl IndexRetriever {
    pub fn new(workspace: PathBuf, config: &PipelineConfig) -> Self {
        let engine = Arc::new(EmbeddingEngine::new(workspace.clone()));
        Self::with_engine(workspace, engine, config)
    }

    pub fn with_engine(
        workspace: PathBuf,
        engine: Arc<EmbeddingEngine>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            workspace,
            engine,
            top_k: config.top_k,
            min_relevance_score: config.min_relevance_score,
        }
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(
        &self,
        kb_id: &Uuid,
        question: &str,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let kb = kb_id.to_string();
        if !base_exists(&self.workspace, &kb) {
            return Err(RetrievalError::KnowledgeBaseNotFound(*kb_id));
        }

        let embedding = self
            .engine
            .embed_query(&kb, question)
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let index_path = get_index_path(&self.workspace, &kb);
        let top_k = self.top_k;
        let hits = tokio::task::spawn_blocking(move || {
            SqliteIndex::open_existing(&index_path)?.search(&embedding, top_k)
        })
        .await
        .map_err(|e| RetrievalError::Index(format!("search task failed: {}", e)))?
        .map_err(|e| RetrievalError::Index(e.to_string()))?;

        let found = hits.len();
        let mut chunks: Vec<ScoredChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.min_relevance_score)
            .collect();
        rank_chunks(&mut chunks, self.top_k);

        tracing::debug!(
            "Retrieved {} of {} chunks above relevance {:.2} for base '{}'",
            chunks.len(),
            found,
            self.min_relevance_score,
            kb
        );

        Ok(chunks)
    }
}
