//! Audit trail of a query.
//!
//! Each pipeline stage contributes one [`StageRecord`]. The recorder turns
//! them into tracing spans named after the stage, with dotted attribute keys
//! (`interaction.id`, `retrieval.chunk_count`, ...), and persists the
//! finalized interaction.

use crate::domain::{Interaction, PipelineStage};
use crate::error::AuditError;
use crate::store::InteractionStore;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// What one stage reported. Errors are internal detail and never leave the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub enum StageRecord {
    Retrieval {
        chunk_count: usize,
        top_score: f32,
        error: Option<String>,
    },
    Generation {
        model: String,
        provider: String,
        tokens: u32,
        error: Option<String>,
    },
    Grounding {
        is_grounded: bool,
        confidence: f32,
    },
}

impl StageRecord {
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Retrieval { .. } => PipelineStage::Retrieval,
            Self::Generation { .. } => PipelineStage::Generation,
            Self::Grounding { .. } => PipelineStage::Grounding,
        }
    }

    /// Attributes of the stage span, keyed by dotted name.
    pub fn attributes(&self, interaction: &Interaction) -> Vec<(&'static str, AttributeValue)> {
        let mut attrs = vec![(
            "interaction.id",
            AttributeValue::Str(interaction.id.to_string()),
        )];

        match self {
            Self::Retrieval {
                chunk_count,
                top_score,
                error,
            } => {
                attrs.push((
                    "interaction.kb_id",
                    AttributeValue::Str(interaction.kb_id.to_string()),
                ));
                attrs.push((
                    "retrieval.chunk_count",
                    AttributeValue::Int(i64::try_from(*chunk_count).unwrap_or(i64::MAX)),
                ));
                attrs.push(("retrieval.top_score", AttributeValue::Float(f64::from(*top_score))));
                if let Some(error) = error {
                    attrs.push(("retrieval.error", AttributeValue::Str(error.clone())));
                }
            }
            Self::Generation {
                model,
                provider,
                tokens,
                error,
            } => {
                attrs.push(("generation.model", AttributeValue::Str(model.clone())));
                attrs.push(("generation.provider", AttributeValue::Str(provider.clone())));
                attrs.push(("generation.tokens", AttributeValue::Int(i64::from(*tokens))));
                if let Some(error) = error {
                    attrs.push(("generation.error", AttributeValue::Str(error.clone())));
                }
            }
            Self::Grounding {
                is_grounded,
                confidence,
            } => {
                attrs.push(("grounding.is_grounded", AttributeValue::Bool(*is_grounded)));
                attrs.push(("grounding.confidence", AttributeValue::Float(f64::from(*confidence))));
            }
        }

        attrs
    }
}

/// Records the audit trail of one finalized interaction.
///
/// Called once per query, after the terminal state. Failures are reported
/// to the orchestrator, which only logs them.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, interaction: &Interaction, stages: &[StageRecord]) -> Result<(), AuditError>;
}

/// Emits one span per stage through `tracing` and saves the interaction.
pub struct TracingAuditRecorder {
    store: Arc<dyn InteractionStore>,
}

impl TracingAuditRecorder {
    pub fn new(store: Arc<dyn InteractionStore>) -> Self {
        Self { store }
    }

    fn emit(interaction: &Interaction, record: &StageRecord) {
        let id = interaction.id.to_string();
        match record {
            StageRecord::Retrieval {
                chunk_count,
                top_score,
                error,
            } => {
                let span = info_span!(
                    "retrieval",
                    interaction.id = %id,
                    interaction.kb_id = %interaction.kb_id,
                    retrieval.chunk_count = *chunk_count as u64,
                    retrieval.top_score = f64::from(*top_score),
                    retrieval.error = tracing::field::Empty,
                );
                if let Some(error) = error {
                    span.record("retrieval.error", error.as_str());
                }
                span.in_scope(|| info!("retrieval stage recorded"));
            }
            StageRecord::Generation {
                model,
                provider,
                tokens,
                error,
            } => {
                let span = info_span!(
                    "generation",
                    interaction.id = %id,
                    generation.model = %model,
                    generation.provider = %provider,
                    generation.tokens = *tokens,
                    generation.error = tracing::field::Empty,
                );
                if let Some(error) = error {
                    span.record("generation.error", error.as_str());
                }
                span.in_scope(|| info!("generation stage recorded"));
            }
            StageRecord::Grounding {
                is_grounded,
                confidence,
            } => {
                let span = info_span!(
                    "grounding",
                    interaction.id = %id,
                    grounding.is_grounded = *is_grounded,
                    grounding.confidence = f64::from(*confidence),
                );
                span.in_scope(|| info!("grounding stage recorded"));
            }
        }
    }
}

#[async_trait]
impl AuditRecorder for TracingAuditRecorder {
    async fn record(&self, interaction: &Interaction, stages: &[StageRecord]) -> Result<(), AuditError> {
        for record in stages {
            Self::emit(interaction, record);
        }

        self.store.save(interaction).await?;

        tracing::debug!(
            "Interaction {} saved with status {}",
            interaction.id,
            interaction.status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InteractionDraft;
    use crate::error::StoreError;
    use crate::store::InMemoryInteractionStore;
    use uuid::Uuid;

    struct BrokenStore;

    #[async_trait]
    impl InteractionStore for BrokenStore {
        async fn save(&self, _interaction: &Interaction) -> Result<(), StoreError> {
            Err(StoreError::Database("disk I/O error".to_string()))
        }

        async fn get(&self, _id: &Uuid) -> Result<Option<Interaction>, StoreError> {
            Ok(None)
        }

        async fn list(
            &self,
            _kb_id: Option<&Uuid>,
            _limit: usize,
            _offset: usize,
        ) -> Result<Vec<Interaction>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn trail() -> Vec<StageRecord> {
        vec![
            StageRecord::Retrieval {
                chunk_count: 2,
                top_score: 0.87,
                error: None,
            },
            StageRecord::Generation {
                model: "llama3.2".to_string(),
                provider: "ollama".to_string(),
                tokens: 120,
                error: None,
            },
            StageRecord::Grounding {
                is_grounded: true,
                confidence: 0.9,
            },
        ]
    }

    #[test]
    fn test_every_stage_carries_interaction_id() {
        let interaction = InteractionDraft::open(Uuid::new_v4(), "q").unknown();
        let expected = AttributeValue::Str(interaction.id.to_string());

        for record in trail() {
            let attrs = record.attributes(&interaction);
            assert_eq!(attrs[0], ("interaction.id", expected.clone()));
            let prefix = format!("{}.", record.stage());
            assert!(attrs[1..]
                .iter()
                .all(|(key, _)| key.starts_with(&prefix) || *key == "interaction.kb_id"));
        }
    }

    #[test]
    fn test_error_attribute_only_when_failed() {
        let interaction = InteractionDraft::open(Uuid::new_v4(), "q").failed("retrieval failed");
        let failed = StageRecord::Retrieval {
            chunk_count: 0,
            top_score: 0.0,
            error: Some("index unavailable".to_string()),
        };

        let keys: Vec<&str> = failed.attributes(&interaction).iter().map(|(k, _)| *k).collect();
        assert!(keys.contains(&"retrieval.error"));

        let keys: Vec<&str> = trail()[0].attributes(&interaction).iter().map(|(k, _)| *k).collect();
        assert!(!keys.contains(&"retrieval.error"));
    }

    #[tokio::test]
    async fn test_recorder_persists_interaction() {
        let store = Arc::new(InMemoryInteractionStore::new());
        let recorder = TracingAuditRecorder::new(store.clone());
        let interaction = InteractionDraft::open(Uuid::new_v4(), "q").unknown();

        recorder.record(&interaction, &trail()).await.unwrap();

        assert_eq!(store.get(&interaction.id).await.unwrap(), Some(interaction));
    }

    #[tokio::test]
    async fn test_recorder_surfaces_store_failure() {
        let recorder = TracingAuditRecorder::new(Arc::new(BrokenStore));
        let interaction = InteractionDraft::open(Uuid::new_v4(), "q").unknown();

        let err = recorder.record(&interaction, &trail()).await.unwrap_err();
        assert!(matches!(err, AuditError::Store(StoreError::Database(_))));
    }
}
