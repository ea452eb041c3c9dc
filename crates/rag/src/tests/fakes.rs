//! Scripted collaborators for driving the orchestrator in tests.

use crate::audit::{AuditRecorder, StageRecord};
use crate::config::PipelineConfig;
use crate::domain::{GroundingDecision, Interaction};
use crate::error::{AuditError, GenerationError, RetrievalError};
use crate::generator::{AnswerGenerator, GeneratedAnswer};
use crate::grounding::GroundingEvaluator;
use crate::orchestrator::QueryOrchestrator;
use crate::request::QueryRequest;
use crate::retriever::Retriever;
use async_trait::async_trait;
use grounded_knowledge::{Chunk, ScoredChunk};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const KB: &str = "7c1e5b2a-9d4f-4a3e-8b6c-2f0a1d3e5c7b";

pub fn request(question: &str) -> QueryRequest {
    QueryRequest::new(KB, question)
}

pub fn chunk(id: &str, source: &str, page: Option<u32>, content: &str, score: f32) -> ScoredChunk {
    let mut metadata = serde_json::json!({ "source_document": source });
    if let Some(page) = page {
        metadata["page"] = serde_json::json!(page);
    }
    ScoredChunk {
        chunk: Chunk {
            id: id.to_string(),
            document_id: format!("doc-{}", source),
            position: 0,
            content: content.to_string(),
            embedding: Vec::new(),
            metadata,
        },
        score,
    }
}

/// Warranty manual page plus an unrelated shipping note.
pub fn warranty_evidence() -> Vec<ScoredChunk> {
    vec![
        chunk(
            "c-warranty",
            "warranty.pdf",
            Some(3),
            "The warranty period is 2 years from the date of purchase.",
            0.91,
        ),
        chunk(
            "c-shipping",
            "shipping.md",
            None,
            "Orders ship within 3 business days.",
            0.42,
        ),
    ]
}

pub struct FakeRetriever {
    outcome: Result<Vec<ScoredChunk>, RetrievalError>,
    hang: bool,
    calls: AtomicUsize,
}

impl FakeRetriever {
    pub fn returning(chunks: Vec<ScoredChunk>) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(chunks),
            hang: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(err: RetrievalError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(err),
            hang: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Never completes.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(Vec::new()),
            hang: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(
        &self,
        _kb_id: &Uuid,
        _question: &str,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcome.clone()
    }
}

pub struct FakeGenerator {
    outcome: Result<GeneratedAnswer, GenerationError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(GeneratedAnswer {
                text: text.to_string(),
                model: "llama3.2".to_string(),
                provider: "fake".to_string(),
                tokens: 64,
            }),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(err: GenerationError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(err),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(GeneratedAnswer {
                text: text.to_string(),
                model: "llama3.2".to_string(),
                provider: "fake".to_string(),
                tokens: 64,
            }),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerGenerator for FakeGenerator {
    async fn generate(
        &self,
        _question: &str,
        _chunks: &[ScoredChunk],
    ) -> Result<GeneratedAnswer, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

/// Returns the same decision whatever it is shown.
pub struct FixedEvaluator(pub GroundingDecision);

impl FixedEvaluator {
    pub fn grounded(confidence: f32, ids: &[&str]) -> Arc<Self> {
        Arc::new(Self(GroundingDecision {
            is_grounded: true,
            confidence,
            reasoning: "fixed".to_string(),
            supporting_chunk_ids: ids.iter().map(|s| s.to_string()).collect(),
        }))
    }
}

impl GroundingEvaluator for FixedEvaluator {
    fn evaluate(&self, _question: &str, _answer: &str, _chunks: &[ScoredChunk]) -> GroundingDecision {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct CapturingRecorder {
    records: Mutex<Vec<(Interaction, Vec<StageRecord>)>>,
    failure: Option<AuditError>,
    delay: Option<Duration>,
}

impl CapturingRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(err: AuditError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(err),
            ..Default::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn records(&self) -> Vec<(Interaction, Vec<StageRecord>)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditRecorder for CapturingRecorder {
    async fn record(&self, interaction: &Interaction, stages: &[StageRecord]) -> Result<(), AuditError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.records
            .lock()
            .unwrap()
            .push((interaction.clone(), stages.to_vec()));
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn orchestrator(
    config: PipelineConfig,
    retriever: Arc<FakeRetriever>,
    generator: Arc<FakeGenerator>,
    evaluator: Arc<dyn GroundingEvaluator>,
    recorder: Arc<CapturingRecorder>,
) -> QueryOrchestrator {
    QueryOrchestrator::new(config, retriever, generator, evaluator, recorder)
}
