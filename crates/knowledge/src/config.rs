//! Knowledge base configuration and on-disk layout.
//!
//! Every base lives in `.grounded/knowledge/<kb_id>/` and is keyed by a UUID.

use crate::types::KnowledgeBaseConfig;
use grounded_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Reject identifiers that are not UUIDs (they become directory names).
pub fn ensure_valid_kb_id(kb_id: &str) -> AppResult<()> {
    uuid::Uuid::parse_str(kb_id).map(|_| ()).map_err(|_| {
        AppError::Validation(format!("Knowledge base id must be a UUID, got '{}'", kb_id))
    })
}

/// Load knowledge base configuration.
///
/// Loads from `.grounded/knowledge/<kb_id>/config.yaml` if it exists,
/// otherwise returns a default config for the base.
pub fn load_config(workspace: &Path, kb_id: &str) -> AppResult<KnowledgeBaseConfig> {
    let config_path = get_config_path(workspace, kb_id);

    if !config_path.exists() {
        tracing::debug!("No config file for base '{}', using defaults", kb_id);
        return Ok(KnowledgeBaseConfig {
            name: kb_id.to_string(),
            ..Default::default()
        });
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Knowledge(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    config.name = kb_id.to_string();

    if config.chunk_size == 0 {
        return Err(AppError::Knowledge(format!(
            "chunk_size must be greater than zero in {:?}",
            config_path
        )));
    }

    tracing::debug!("Loaded knowledge base config for '{}'", kb_id);
    Ok(config)
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

pub fn get_base_dir(workspace: &Path, kb_id: &str) -> PathBuf {
    workspace.join(".grounded").join("knowledge").join(kb_id)
}

pub fn get_config_path(workspace: &Path, kb_id: &str) -> PathBuf {
    get_base_dir(workspace, kb_id).join("config.yaml")
}

pub fn get_index_path(workspace: &Path, kb_id: &str) -> PathBuf {
    get_base_dir(workspace, kb_id).join("index.sqlite")
}

/// A base exists once something has been ingested into it.
pub fn base_exists(workspace: &Path, kb_id: &str) -> bool {
    get_index_path(workspace, kb_id).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KB: &str = "6f1c1a52-8f8e-4c61-9d43-2a7f0e1b9c11";

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), KB).unwrap();

        assert_eq!(config.name, KB);
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.chunk_size, 200);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let config = KnowledgeBaseConfig {
            name: KB.to_string(),
            chunk_size: 120,
            ..Default::default()
        };

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path(), KB).unwrap();
        assert_eq!(loaded.chunk_size, 120);
        assert!(get_config_path(temp.path(), KB).exists());
        assert!(!base_exists(temp.path(), KB));
    }

    #[test]
    fn test_kb_id_must_be_uuid() {
        assert!(ensure_valid_kb_id(KB).is_ok());
        assert!(matches!(
            ensure_valid_kb_id("../etc"),
            Err(AppError::Validation(_))
        ));
    }
}
