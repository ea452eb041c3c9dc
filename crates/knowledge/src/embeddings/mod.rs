//! Embedding engine for knowledge bases.
//!
//! Resolves and caches one provider per knowledge base from its config.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use grounded_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Central embedding engine that manages providers per knowledge base.
pub struct EmbeddingEngine {
    workspace: PathBuf,
    providers: RwLock<HashMap<String, Arc<dyn EmbeddingProvider>>>,
}

impl EmbeddingEngine {
    pub fn new(workspace: PathBuf) -> Self {
        Self {
            workspace,
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the provider for a knowledge base.
    pub fn provider_for(&self, kb_id: &str) -> AppResult<Arc<dyn EmbeddingProvider>> {
        {
            let providers = self
                .providers
                .read()
                .map_err(|_| AppError::Knowledge("Embedding provider cache poisoned".to_string()))?;
            if let Some(provider) = providers.get(kb_id) {
                return Ok(Arc::clone(provider));
            }
        }

        let config = EmbeddingConfig::load(&self.workspace, kb_id)?;

        tracing::debug!(
            "Creating embedding provider for base '{}': provider={}, model={}, dimensions={}",
            kb_id,
            config.provider,
            config.model,
            config.dimensions
        );

        let provider = create_provider(&config)?;

        let mut providers = self
            .providers
            .write()
            .map_err(|_| AppError::Knowledge("Embedding provider cache poisoned".to_string()))?;
        let entry = providers
            .entry(kb_id.to_string())
            .or_insert_with(|| Arc::clone(&provider));

        Ok(Arc::clone(entry))
    }

    /// Embed multiple texts for a knowledge base.
    pub async fn embed_texts(&self, kb_id: &str, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.provider_for(kb_id)?;

        tracing::debug!(
            "Embedding {} texts for base '{}' using provider '{}' (model: {})",
            texts.len(),
            kb_id,
            provider.provider_name(),
            provider.model_name()
        );

        let embeddings = provider.embed_batch(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(AppError::Knowledge(format!(
                "Provider returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(embeddings)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, kb_id: &str, text: &str) -> AppResult<Vec<f32>> {
        self.provider_for(kb_id)?.embed(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnowledgeBaseConfig;
    use tempfile::TempDir;

    const KB: &str = "5a0d7c2e-1b3f-4a5d-8e9f-0a1b2c3d4e5f";

    fn engine_with_base(dim: u32) -> (TempDir, EmbeddingEngine) {
        let temp = TempDir::new().unwrap();
        let base = KnowledgeBaseConfig {
            name: KB.to_string(),
            embedding_dim: dim,
            ..Default::default()
        };
        crate::config::save_config(temp.path(), &base).unwrap();
        let engine = EmbeddingEngine::new(temp.path().to_path_buf());
        (temp, engine)
    }

    #[tokio::test]
    async fn test_embed_texts_with_base_dimensions() {
        let (_temp, engine) = engine_with_base(128);

        let texts = vec!["hello world".to_string(), "test embedding".to_string()];
        let embeddings = engine.embed_texts(KB, &texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 128);
        assert_eq!(engine.embed_query(KB, "hello").await.unwrap().len(), 128);
    }

    #[tokio::test]
    async fn test_provider_is_cached() {
        let (_temp, engine) = engine_with_base(64);

        let first = engine.provider_for(KB).unwrap();
        let second = engine.provider_for(KB).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (_temp, engine) = engine_with_base(64);
        assert!(engine.embed_texts(KB, &[]).await.unwrap().is_empty());
    }
}
