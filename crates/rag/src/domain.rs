//! Domain entities of a grounded query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// The only answer text ever returned with `status: "unknown"`.
pub const UNKNOWN_ANSWER: &str = "I don't have that information in the provided knowledge base.";

/// Pointer from an answer back to a chunk that supports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source_document: String,
    pub page: Option<u32>,
    pub chunk_id: String,
    /// Within [0, 1]
    pub relevance_score: f32,
}

/// Verdict on whether a candidate answer is supported by the evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingDecision {
    pub is_grounded: bool,
    pub confidence: f32,
    pub reasoning: String,
    pub supporting_chunk_ids: BTreeSet<String>,
}

impl GroundingDecision {
    pub fn rejected(reasoning: impl Into<String>) -> Self {
        Self {
            is_grounded: false,
            confidence: 0.0,
            reasoning: reasoning.into(),
            supporting_chunk_ids: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionStatus {
    Answered,
    Unknown,
    Error,
}

impl InteractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "answered" => Some(Self::Answered),
            "unknown" => Some(Self::Unknown),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Retrieval,
    Generation,
    Grounding,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::Generation => "generation",
            Self::Grounding => "grounding",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a query ended with the unknown response.
#[derive(Debug, Clone, PartialEq)]
pub enum UnknownReason {
    /// Retrieval returned no chunks; generation was skipped.
    NoEvidence,
    /// The grounding gate rejected the candidate answer.
    GroundingRejected { confidence: f32, reasoning: String },
    /// The decision was grounded but no citation could be built.
    NoCitableEvidence,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEvidence => write!(f, "no evidence retrieved"),
            Self::GroundingRejected {
                confidence,
                reasoning,
            } => write!(f, "grounding rejected (confidence {:.2}): {}", confidence, reasoning),
            Self::NoCitableEvidence => write!(f, "no citable evidence"),
        }
    }
}

/// Interaction opened at pipeline entry. Finalized exactly once.
#[derive(Debug, Clone)]
pub struct InteractionDraft {
    pub id: Uuid,
    pub kb_id: Uuid,
    pub question: String,
    pub created_at: DateTime<Utc>,
}

impl InteractionDraft {
    /// Open a new interaction with a fresh UUIDv4.
    pub fn open(kb_id: Uuid, question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kb_id,
            question: question.into(),
            created_at: Utc::now(),
        }
    }

    pub fn answered(self, answer: String, citations: Vec<Citation>) -> Interaction {
        self.finalize(InteractionStatus::Answered, Some(answer), citations, None)
    }

    pub fn unknown(self) -> Interaction {
        self.finalize(
            InteractionStatus::Unknown,
            Some(UNKNOWN_ANSWER.to_string()),
            Vec::new(),
            None,
        )
    }

    pub fn failed(self, public_error: &str) -> Interaction {
        self.finalize(
            InteractionStatus::Error,
            None,
            Vec::new(),
            Some(public_error.to_string()),
        )
    }

    fn finalize(
        self,
        status: InteractionStatus,
        answer: Option<String>,
        citations: Vec<Citation>,
        error: Option<String>,
    ) -> Interaction {
        Interaction {
            id: self.id,
            kb_id: self.kb_id,
            question: self.question,
            answer,
            status,
            citations,
            error,
            created_at: self.created_at,
        }
    }
}

/// One finished question/answer cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub kb_id: Uuid,
    pub question: String,
    pub answer: Option<String>,
    pub status: InteractionStatus,
    pub citations: Vec<Citation>,
    /// Public error message when `status` is `error`
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
