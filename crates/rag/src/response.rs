use crate::domain::{Citation, Interaction, InteractionStatus};
use serde::{Deserialize, Serialize};

/// Outbound result of one query. Serialized as-is by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: InteractionStatus,
    pub answer: Option<String>,
    pub citations: Vec<Citation>,
    pub interaction_id: String,
    pub error: Option<String>,
}

impl From<&Interaction> for QueryResponse {
    fn from(interaction: &Interaction) -> Self {
        Self {
            status: interaction.status,
            answer: interaction.answer.clone(),
            citations: interaction.citations.clone(),
            interaction_id: interaction.id.to_string(),
            error: interaction.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InteractionDraft, UNKNOWN_ANSWER};
    use uuid::Uuid;

    #[test]
    fn test_unknown_response_json() {
        let interaction = InteractionDraft::open(Uuid::new_v4(), "Who is the CEO?").unknown();
        let response = QueryResponse::from(&interaction);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "unknown");
        assert_eq!(json["answer"], UNKNOWN_ANSWER);
        assert_eq!(json["citations"], serde_json::json!([]));
        assert_eq!(json["interaction_id"], interaction.id.to_string());
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_error_response_json() {
        let interaction = InteractionDraft::open(Uuid::new_v4(), "q").failed("generation failed");
        let json = serde_json::to_value(QueryResponse::from(&interaction)).unwrap();

        assert_eq!(json["status"], "error");
        assert!(json["answer"].is_null());
        assert_eq!(json["error"], "generation failed");
    }
}
