//! Grounded question answering pipeline.
//!
//! A query moves through a fixed sequence of stages: retrieval, generation,
//! grounding, then citation. An answer is only released when the grounding
//! gate accepts it; every other negative outcome becomes the fixed unknown
//! response. Each run is audited under one interaction id.
//!
//! The stage collaborators are ports ([`Retriever`], [`AnswerGenerator`],
//! [`GroundingEvaluator`], [`AuditRecorder`], [`InteractionStore`]) with one
//! production adapter each.

pub mod audit;
pub mod citations;
pub mod config;
pub mod domain;
pub mod error;
pub mod generator;
pub mod grounding;
pub mod orchestrator;
pub mod request;
pub mod response;
pub mod retriever;
pub mod store;

#[cfg(test)]
mod tests;

pub use audit::{AttributeValue, AuditRecorder, StageRecord, TracingAuditRecorder};
pub use citations::CitationBuilder;
pub use config::PipelineConfig;
pub use domain::{
    Citation, GroundingDecision, Interaction, InteractionStatus, PipelineStage, UnknownReason,
    UNKNOWN_ANSWER,
};
pub use error::{
    AuditError, GenerationError, PipelineFault, RetrievalError, StoreError, ValidationError,
};
pub use generator::{AnswerGenerator, GeneratedAnswer, LlmAnswerGenerator};
pub use grounding::{GroundingEvaluator, GroundingPolicy, LexicalGroundingEvaluator};
pub use orchestrator::{Outcome, PipelineState, QueryOrchestrator};
pub use request::{QueryRequest, ValidatedQuery, MAX_QUESTION_CHARS};
pub use response::QueryResponse;
pub use retriever::{IndexRetriever, Retriever};
pub use store::{
    summarize, InMemoryInteractionStore, InteractionStore, InteractionSummary,
    SqliteInteractionStore,
};
