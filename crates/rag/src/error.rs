//! Error taxonomy of the query pipeline.
//!
//! Only [`RetrievalError`] and [`GenerationError`] (and interruption of the
//! stages that produce them) end a query with `status: "error"`. Missing or
//! rejected evidence is not an error; see [`crate::UnknownReason`].

use crate::domain::PipelineStage;
use grounded_core::AppError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Malformed request, rejected before an interaction exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("knowledge_base_id must be a UUID, got '{0}'")]
    InvalidKnowledgeBaseId(String),

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("question is {len} characters long, the limit is {max}")]
    QuestionTooLong { len: usize, max: usize },
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetrievalError {
    #[error("knowledge base not found: {0}")]
    KnowledgeBaseNotFound(Uuid),

    #[error("question embedding failed: {0}")]
    Embedding(String),

    #[error("index unavailable: {0}")]
    Index(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider failure: {0}")]
    Provider(String),

    #[error("prompt rendering failed: {0}")]
    Prompt(String),

    #[error("provider returned an empty answer")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("interaction {0} already stored")]
    Duplicate(Uuid),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt interaction record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Audit failures are logged, never returned to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuditError {
    #[error("failed to persist interaction: {0}")]
    Store(#[from] StoreError),

    #[error("audit did not finish within {0:?}")]
    Timeout(Duration),
}

/// Unrecoverable fault that moves a query to `Failed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineFault {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("cancelled during {stage}")]
    Cancelled { stage: PipelineStage },

    #[error("deadline exceeded during {stage}")]
    DeadlineExceeded { stage: PipelineStage },
}

impl PipelineFault {
    /// Text allowed to cross the response boundary. Carries no internal detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            PipelineFault::Retrieval(_) => "retrieval failed",
            PipelineFault::Generation(_) => "generation failed",
            PipelineFault::Cancelled { .. } => "request cancelled",
            PipelineFault::DeadlineExceeded { .. } => "deadline exceeded",
        }
    }

    /// Stage that was running when the fault occurred.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineFault::Retrieval(_) => PipelineStage::Retrieval,
            PipelineFault::Generation(_) => PipelineStage::Generation,
            PipelineFault::Cancelled { stage } | PipelineFault::DeadlineExceeded { stage } => {
                *stage
            }
        }
    }
}
