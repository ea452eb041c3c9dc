//! Embedding configuration derived from a knowledge base config.

use crate::types::KnowledgeBaseConfig;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Embedding settings for one knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_base(&KnowledgeBaseConfig::default())
    }
}

impl EmbeddingConfig {
    pub fn from_base(base: &KnowledgeBaseConfig) -> Self {
        Self {
            provider: base.provider.clone(),
            model: base.model.clone(),
            dimensions: base.embedding_dim as usize,
            endpoint: base.endpoint.clone(),
        }
    }

    /// Load the embedding settings of a base from its config.yaml.
    pub fn load(workspace: &Path, kb_id: &str) -> AppResult<Self> {
        let base = crate::config::load_config(workspace, kb_id)?;
        let config = Self::from_base(&base);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Knowledge(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Knowledge(
                "Embedding model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, 384);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_load_from_base_config() {
        let temp = TempDir::new().unwrap();
        let kb = "0b3f9c1e-2d4a-4e8b-9a6c-1f2e3d4c5b6a";
        let base = KnowledgeBaseConfig {
            name: kb.to_string(),
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            endpoint: Some("http://gpu-box:11434".to_string()),
            embedding_dim: 768,
            ..Default::default()
        };
        crate::config::save_config(temp.path(), &base).unwrap();

        let loaded = EmbeddingConfig::load(temp.path(), kb).unwrap();
        assert_eq!(loaded.provider, "ollama");
        assert_eq!(loaded.dimensions, 768);
        assert_eq!(loaded.endpoint.as_deref(), Some("http://gpu-box:11434"));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = EmbeddingConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
