//! Grounding gate: the evaluator port, its lexical adapter, and the policy
//! that decides whether a candidate answer may be released.

use crate::domain::{GroundingDecision, UNKNOWN_ANSWER};
use grounded_knowledge::ScoredChunk;
use std::collections::{BTreeSet, HashSet};

/// Judges whether a candidate answer is supported by the retrieved chunks.
///
/// Must be deterministic for identical inputs and must not consult anything
/// beyond its arguments.
pub trait GroundingEvaluator: Send + Sync {
    fn evaluate(
        &self,
        question: &str,
        candidate_answer: &str,
        chunks: &[ScoredChunk],
    ) -> GroundingDecision;
}

const STOP_WORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "been", "but", "can", "could", "did",
    "does", "for", "from", "had", "has", "have", "her", "his", "how", "into", "its", "may",
    "only", "our", "per", "she", "should", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "was", "were", "what", "when", "where",
    "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Every negator folds into this one term.
const NEGATION: &str = "not";

const NEGATORS: &[&str] = &[
    "no", "not", "never", "none", "nor", "neither", "nobody", "nothing", "cannot",
];

/// Word-overlap evaluator.
///
/// Confidence is the share of the answer's meaningful words that occur in the
/// evidence. A chunk supports the answer when it contains at least one of the
/// matched words. Any number in the answer that appears in no chunk makes the
/// answer ungrounded, and so does a negation the evidence never states.
#[derive(Debug, Clone, Default)]
pub struct LexicalGroundingEvaluator;

impl LexicalGroundingEvaluator {
    pub fn new() -> Self {
        Self
    }
}

fn is_number(term: &str) -> bool {
    term.chars().all(|c| c.is_ascii_digit())
}

fn is_negator(word: &str) -> bool {
    NEGATORS.contains(&word) || word.ends_with("n't")
}

fn content_term(word: &str) -> Option<String> {
    if is_number(word) {
        return Some(word.to_string());
    }
    if word.chars().count() < 3 || STOP_WORDS.contains(&word) {
        return None;
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        Some(word[..word.len() - 1].to_string())
    } else {
        Some(word.to_string())
    }
}

/// Lowercased content words with a naive plural fold. Negators, contracted
/// or not, are kept as [`NEGATION`].
fn terms(text: &str) -> BTreeSet<String> {
    let text = text.to_lowercase().replace('\u{2019}', "'");
    let mut out = BTreeSet::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '\'') {
        let word = word.trim_matches('\'');
        if word.is_empty() {
            continue;
        }
        if is_negator(word) {
            out.insert(NEGATION.to_string());
            continue;
        }
        out.extend(word.split('\'').filter_map(content_term));
    }
    out
}

fn normalize_sentence(text: &str) -> String {
    text.trim()
        .replace('\u{2019}', "'")
        .trim_end_matches('.')
        .to_lowercase()
}

fn declines(candidate: &str) -> bool {
    normalize_sentence(candidate).contains(&normalize_sentence(UNKNOWN_ANSWER))
}

impl GroundingEvaluator for LexicalGroundingEvaluator {
    fn evaluate(
        &self,
        _question: &str,
        candidate_answer: &str,
        chunks: &[ScoredChunk],
    ) -> GroundingDecision {
        if chunks.is_empty() {
            return GroundingDecision::rejected("No chunks were provided as evidence");
        }
        if declines(candidate_answer) {
            return GroundingDecision::rejected("Generator declined to answer from the evidence");
        }

        let answer_terms = terms(candidate_answer);
        if answer_terms.is_empty() {
            return GroundingDecision::rejected("Answer has no meaningful words to check");
        }

        let evidence: Vec<(&str, BTreeSet<String>)> = chunks
            .iter()
            .map(|scored| (scored.chunk.id.as_str(), terms(&scored.chunk.content)))
            .collect();

        let matched: BTreeSet<&String> = answer_terms
            .iter()
            .filter(|term| evidence.iter().any(|(_, words)| words.contains(*term)))
            .collect();

        let supporting_chunk_ids: BTreeSet<String> = evidence
            .iter()
            .filter(|(_, words)| matched.iter().any(|term| words.contains(*term)))
            .map(|(id, _)| id.to_string())
            .collect();

        let unsupported_numbers: Vec<&str> = answer_terms
            .iter()
            .filter(|term| is_number(term) && !matched.contains(term))
            .map(String::as_str)
            .collect();

        let unsupported_negation =
            answer_terms.contains(NEGATION) && !matched.iter().any(|t| t.as_str() == NEGATION);

        let confidence = matched.len() as f32 / answer_terms.len() as f32;
        let mut reasoning = format!(
            "{} of {} meaningful words found in {} of {} chunks",
            matched.len(),
            answer_terms.len(),
            supporting_chunk_ids.len(),
            chunks.len()
        );
        if !unsupported_numbers.is_empty() {
            reasoning.push_str(&format!(
                "; numbers not in evidence: {}",
                unsupported_numbers.join(", ")
            ));
        }
        if unsupported_negation {
            reasoning.push_str("; negation not in evidence");
        }

        GroundingDecision {
            is_grounded: unsupported_numbers.is_empty()
                && !unsupported_negation
                && !supporting_chunk_ids.is_empty(),
            confidence,
            reasoning,
            supporting_chunk_ids,
        }
    }
}

/// Fail-closed acceptance rule applied to every evaluator decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundingPolicy {
    threshold: f32,
}

impl GroundingPolicy {
    /// Thresholds are clamped to [0, 1]; NaN becomes 1.0.
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_nan() {
            1.0
        } else {
            threshold.clamp(0.0, 1.0)
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Downgrade a decision that the evidence does not back.
    ///
    /// Supporting ids that were not retrieved are dropped and reject the
    /// answer. Confidence below the threshold rejects it. A grounded decision
    /// always keeps at least one supporting id.
    pub fn apply(&self, decision: GroundingDecision, chunks: &[ScoredChunk]) -> GroundingDecision {
        let retrieved: HashSet<&str> = chunks.iter().map(|c| c.chunk.id.as_str()).collect();

        let confidence = if decision.confidence.is_nan() {
            0.0
        } else {
            decision.confidence.clamp(0.0, 1.0)
        };
        let mut is_grounded = decision.is_grounded;
        let mut reasoning = decision.reasoning;

        let (known, foreign): (BTreeSet<String>, BTreeSet<String>) = decision
            .supporting_chunk_ids
            .into_iter()
            .partition(|id| retrieved.contains(id.as_str()));

        if !foreign.is_empty() {
            is_grounded = false;
            let ids: Vec<&str> = foreign.iter().map(String::as_str).collect();
            reasoning.push_str(&format!(
                "; rejected: cites chunks that were not retrieved ({})",
                ids.join(", ")
            ));
        }

        if is_grounded && confidence < self.threshold {
            is_grounded = false;
            reasoning.push_str(&format!(
                "; rejected: confidence {:.2} below threshold {:.2}",
                confidence, self.threshold
            ));
        }

        if is_grounded && known.is_empty() {
            is_grounded = false;
            reasoning.push_str("; rejected: no supporting chunks");
        }

        GroundingDecision {
            is_grounded,
            confidence,
            reasoning,
            supporting_chunk_ids: known,
        }
    }
}
