use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted question, counted in characters after trimming.
pub const MAX_QUESTION_CHARS: usize = 4000;

/// Inbound query as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub knowledge_base_id: String,
    pub question: String,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    pub kb_id: Uuid,
    pub question: String,
}

impl QueryRequest {
    pub fn new(knowledge_base_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.into(),
            question: question.into(),
        }
    }

    pub fn validate(&self) -> Result<ValidatedQuery, ValidationError> {
        let raw_id = self.knowledge_base_id.trim();
        let kb_id = Uuid::parse_str(raw_id)
            .map_err(|_| ValidationError::InvalidKnowledgeBaseId(raw_id.to_string()))?;

        let question = self.question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }

        let len = question.chars().count();
        if len > MAX_QUESTION_CHARS {
            return Err(ValidationError::QuestionTooLong {
                len,
                max: MAX_QUESTION_CHARS,
            });
        }

        Ok(ValidatedQuery {
            kb_id,
            question: question.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KB: &str = "5a0d7c2e-1b3f-4a5d-8e9f-0a1b2c3d4e5f";

    #[test]
    fn test_valid_request_is_trimmed() {
        let query = QueryRequest::new(KB, "  What is the warranty period?\n")
            .validate()
            .unwrap();

        assert_eq!(query.kb_id.to_string(), KB);
        assert_eq!(query.question, "What is the warranty period?");
    }

    #[test]
    fn test_rejects_non_uuid_kb() {
        let err = QueryRequest::new("manuals", "What?").validate().unwrap_err();
        assert_eq!(err, ValidationError::InvalidKnowledgeBaseId("manuals".into()));
    }

    #[test]
    fn test_rejects_blank_question() {
        let err = QueryRequest::new(KB, " \t\n").validate().unwrap_err();
        assert_eq!(err, ValidationError::EmptyQuestion);
    }

    #[test]
    fn test_length_limit_counts_chars() {
        // Multi-byte chars must not be counted as bytes
        let at_limit = "é".repeat(MAX_QUESTION_CHARS);
        assert!(QueryRequest::new(KB, at_limit).validate().is_ok());

        let over = "a".repeat(MAX_QUESTION_CHARS + 1);
        assert!(matches!(
            QueryRequest::new(KB, over).validate(),
            Err(ValidationError::QuestionTooLong { len, .. }) if len == MAX_QUESTION_CHARS + 1
        ));
    }
}
