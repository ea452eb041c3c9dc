//! Query orchestration.
//!
//! A query is a small state machine:
//!
//! ```text
//! Start -> Retrieving -> Generating -> Grounding -> Answered
//!              |             |            |
//!              |             |            +------> Unknown
//!              +-------------|-------------------> Unknown (no evidence)
//!              +-------------+-------------------> Failed
//! ```
//!
//! Every terminal state is finalized into exactly one [`Interaction`] and
//! audited. Cancellation and the overall deadline are checked while
//! retrieval and generation are in flight.

use crate::audit::{AuditRecorder, StageRecord};
use crate::citations::CitationBuilder;
use crate::config::PipelineConfig;
use crate::domain::{
    Citation, GroundingDecision, Interaction, InteractionDraft, PipelineStage, UnknownReason,
};
use crate::error::{AuditError, GenerationError, PipelineFault, ValidationError};
use crate::generator::{AnswerGenerator, GeneratedAnswer};
use crate::grounding::{GroundingEvaluator, GroundingPolicy};
use crate::request::{QueryRequest, ValidatedQuery};
use crate::response::QueryResponse;
use crate::retriever::{rank_chunks, Retriever};
use grounded_knowledge::ScoredChunk;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum PipelineState {
    Start,
    Retrieving,
    Generating {
        chunks: Vec<ScoredChunk>,
    },
    Grounding {
        chunks: Vec<ScoredChunk>,
        candidate: GeneratedAnswer,
    },
    Done(Outcome),
}

/// Terminal states.
#[derive(Debug)]
pub enum Outcome {
    Answered {
        answer: String,
        citations: Vec<Citation>,
        decision: GroundingDecision,
    },
    Unknown {
        reason: UnknownReason,
    },
    Failed {
        fault: PipelineFault,
    },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Retrieving => "retrieving",
            Self::Generating { .. } => "generating",
            Self::Grounding { .. } => "grounding",
            Self::Done(Outcome::Answered { .. }) => "answered",
            Self::Done(Outcome::Unknown { .. }) => "unknown",
            Self::Done(Outcome::Failed { .. }) => "failed",
        }
    }
}

fn done(outcome: Outcome) -> PipelineState {
    PipelineState::Done(outcome)
}

/// Race a stage against cancellation and the query deadline.
///
/// Cancellation wins over the deadline, which wins over a stage result that
/// is ready at the same poll.
async fn interruptible<T, E, F, C>(
    stage: PipelineStage,
    work: F,
    cancelled: Pin<&mut C>,
    deadline: Option<Instant>,
) -> Result<T, PipelineFault>
where
    F: Future<Output = Result<T, E>>,
    E: Into<PipelineFault>,
    C: Future<Output = ()>,
{
    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(PipelineFault::Cancelled { stage }),
        _ = expired => Err(PipelineFault::DeadlineExceeded { stage }),
        result = work => result.map_err(Into::into),
    }
}

/// Runs queries through retrieval, generation and grounding.
///
/// Holds no per-query state; one instance serves any number of concurrent
/// queries.
pub struct QueryOrchestrator {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn AnswerGenerator>,
    evaluator: Arc<dyn GroundingEvaluator>,
    recorder: Arc<dyn AuditRecorder>,
    policy: GroundingPolicy,
    config: PipelineConfig,
}

impl QueryOrchestrator {
    pub fn new(
        config: PipelineConfig,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn AnswerGenerator>,
        evaluator: Arc<dyn GroundingEvaluator>,
        recorder: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            retriever,
            generator,
            evaluator,
            recorder,
            policy: GroundingPolicy::new(config.confidence_threshold),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryResponse, ValidationError> {
        self.execute_until(request, std::future::pending::<()>()).await
    }

    /// Run a query that is abandoned once `cancelled` completes.
    ///
    /// Only a malformed request is returned as `Err`; every other outcome,
    /// including cancellation, is a [`QueryResponse`].
    pub async fn execute_until<C>(
        &self,
        request: &QueryRequest,
        cancelled: C,
    ) -> Result<QueryResponse, ValidationError>
    where
        C: Future<Output = ()>,
    {
        let query = request.validate()?;
        let started = std::time::Instant::now();
        let draft = InteractionDraft::open(query.kb_id, query.question.clone());
        // A budget past the clock's range is no deadline at all
        let deadline = self
            .config
            .query_deadline
            .and_then(|budget| Instant::now().checked_add(budget));
        tokio::pin!(cancelled);

        info!(interaction.id = %draft.id, kb_id = %query.kb_id, "Query started");

        let mut trail = Vec::with_capacity(3);
        let mut state = PipelineState::Start;
        let outcome = loop {
            state = match state {
                PipelineState::Done(outcome) => break outcome,
                current => {
                    let from = current.name();
                    let next = self
                        .advance(current, &query, cancelled.as_mut(), deadline, &mut trail)
                        .await;
                    debug!(interaction.id = %draft.id, "{} -> {}", from, next.name());
                    next
                }
            };
        };

        let interaction = match outcome {
            Outcome::Answered {
                answer,
                citations,
                decision,
            } => {
                debug!(
                    interaction.id = %draft.id,
                    "Answer accepted with confidence {:.2}",
                    decision.confidence
                );
                draft.answered(answer, citations)
            }
            Outcome::Unknown { reason } => {
                info!(interaction.id = %draft.id, "Answering unknown: {}", reason);
                draft.unknown()
            }
            Outcome::Failed { fault } => {
                warn!(interaction.id = %draft.id, stage = %fault.stage(), "Query failed: {}", fault);
                draft.failed(fault.public_message())
            }
        };

        self.audit(&interaction, &trail).await;

        info!(
            interaction.id = %interaction.id,
            status = %interaction.status,
            citations = interaction.citations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query finished"
        );

        Ok(QueryResponse::from(&interaction))
    }

    async fn advance<C>(
        &self,
        state: PipelineState,
        query: &ValidatedQuery,
        cancelled: Pin<&mut C>,
        deadline: Option<Instant>,
        trail: &mut Vec<StageRecord>,
    ) -> PipelineState
    where
        C: Future<Output = ()>,
    {
        match state {
            PipelineState::Start => PipelineState::Retrieving,
            PipelineState::Retrieving => self.retrieve(query, cancelled, deadline, trail).await,
            PipelineState::Generating { chunks } => {
                self.generate(query, chunks, cancelled, deadline, trail).await
            }
            PipelineState::Grounding { chunks, candidate } => {
                self.ground(query, chunks, candidate, trail)
            }
            terminal @ PipelineState::Done(_) => terminal,
        }
    }

    async fn retrieve<C>(
        &self,
        query: &ValidatedQuery,
        cancelled: Pin<&mut C>,
        deadline: Option<Instant>,
        trail: &mut Vec<StageRecord>,
    ) -> PipelineState
    where
        C: Future<Output = ()>,
    {
        let work = self.retriever.retrieve(&query.kb_id, &query.question);

        let result = interruptible(PipelineStage::Retrieval, work, cancelled, deadline).await;
        match result {
            Ok(mut chunks) => {
                rank_chunks(&mut chunks, self.config.top_k);
                trail.push(StageRecord::Retrieval {
                    chunk_count: chunks.len(),
                    top_score: chunks.first().map_or(0.0, |c| c.score),
                    error: None,
                });

                if chunks.is_empty() {
                    done(Outcome::Unknown {
                        reason: UnknownReason::NoEvidence,
                    })
                } else {
                    PipelineState::Generating { chunks }
                }
            }
            Err(fault) => {
                trail.push(StageRecord::Retrieval {
                    chunk_count: 0,
                    top_score: 0.0,
                    error: Some(fault.to_string()),
                });
                done(Outcome::Failed { fault })
            }
        }
    }

    async fn generate<C>(
        &self,
        query: &ValidatedQuery,
        chunks: Vec<ScoredChunk>,
        cancelled: Pin<&mut C>,
        deadline: Option<Instant>,
        trail: &mut Vec<StageRecord>,
    ) -> PipelineState
    where
        C: Future<Output = ()>,
    {
        let budget = self.config.generation_timeout;
        let work = async {
            match tokio::time::timeout(budget, self.generator.generate(&query.question, &chunks))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(budget)),
            }
        };

        let result = interruptible(PipelineStage::Generation, work, cancelled, deadline).await;
        match result {
            Ok(candidate) => {
                trail.push(StageRecord::Generation {
                    model: candidate.model.clone(),
                    provider: candidate.provider.clone(),
                    tokens: candidate.tokens,
                    error: None,
                });
                PipelineState::Grounding { chunks, candidate }
            }
            Err(fault) => {
                trail.push(StageRecord::Generation {
                    model: self.config.model.clone(),
                    provider: self.config.provider.clone(),
                    tokens: 0,
                    error: Some(fault.to_string()),
                });
                done(Outcome::Failed { fault })
            }
        }
    }

    fn ground(
        &self,
        query: &ValidatedQuery,
        chunks: Vec<ScoredChunk>,
        candidate: GeneratedAnswer,
        trail: &mut Vec<StageRecord>,
    ) -> PipelineState {
        let raw = self
            .evaluator
            .evaluate(&query.question, &candidate.text, &chunks);
        let decision = self.policy.apply(raw, &chunks);

        trail.push(StageRecord::Grounding {
            is_grounded: decision.is_grounded,
            confidence: decision.confidence,
        });

        if !decision.is_grounded {
            return done(Outcome::Unknown {
                reason: UnknownReason::GroundingRejected {
                    confidence: decision.confidence,
                    reasoning: decision.reasoning,
                },
            });
        }

        let citations = CitationBuilder::build(&decision.supporting_chunk_ids, &chunks);
        if citations.is_empty() {
            return done(Outcome::Unknown {
                reason: UnknownReason::NoCitableEvidence,
            });
        }

        done(Outcome::Answered {
            answer: candidate.text,
            citations,
            decision,
        })
    }

    /// Best effort, bounded by `audit_timeout`. Never alters the response.
    async fn audit(&self, interaction: &Interaction, trail: &[StageRecord]) {
        let budget = self.config.audit_timeout;
        let result = match tokio::time::timeout(budget, self.recorder.record(interaction, trail)).await
        {
            Ok(result) => result,
            Err(_) => Err(AuditError::Timeout(budget)),
        };

        if let Err(e) = result {
            warn!(interaction.id = %interaction.id, "Audit failed: {}", e);
        }
    }
}
