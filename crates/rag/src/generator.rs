//! Answer generation port and the LLM-backed adapter.

use crate::config::PipelineConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use grounded_core::AppResult;
use grounded_knowledge::ScoredChunk;
use grounded_llm::{LlmClient, LlmRequest};
use grounded_prompt::{build_prompt, load_prompt_or_builtin, PromptChunk, PromptContext, PromptDefinition};
use std::path::Path;
use std::sync::Arc;

/// Candidate answer plus the facts the audit trail needs about its production.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub model: String,
    pub provider: String,
    pub tokens: u32,
}

/// Produces a candidate answer from a question and its evidence.
///
/// The candidate is untrusted until the grounding gate accepts it.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
    ) -> Result<GeneratedAnswer, GenerationError>;
}

pub struct LlmAnswerGenerator {
    client: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmAnswerGenerator {
    pub fn new(client: Arc<dyn LlmClient>, prompt: PromptDefinition, config: &PipelineConfig) -> Self {
        Self {
            client,
            prompt,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve `config.prompt_id` from the workspace, falling back to the built-in prompt.
    pub fn from_workspace(
        client: Arc<dyn LlmClient>,
        workspace: &Path,
        config: &PipelineConfig,
    ) -> AppResult<Self> {
        let prompt = load_prompt_or_builtin(workspace, &config.prompt_id)?;
        Ok(Self::new(client, prompt, config))
    }

    fn prompt_context(question: &str, chunks: &[ScoredChunk]) -> PromptContext {
        PromptContext {
            question: question.to_string(),
            chunks: chunks
                .iter()
                .enumerate()
                .map(|(i, scored)| PromptChunk {
                    index: i + 1,
                    chunk_id: scored.chunk.id.clone(),
                    source: scored.chunk.source_document().to_string(),
                    page: scored.chunk.page(),
                    content: scored.chunk.content.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
    ) -> Result<GeneratedAnswer, GenerationError> {
        let built = build_prompt(&self.prompt, &Self::prompt_context(question, chunks))
            .map_err(|e| GenerationError::Prompt(e.to_string()))?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            "Generating with {} ({}), {} evidence chunks",
            self.model,
            self.client.provider_name(),
            chunks.len()
        );

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(GeneratedAnswer {
            text: text.to_string(),
            model: if response.model.is_empty() {
                self.model.clone()
            } else {
                response.model
            },
            provider: self.client.provider_name().to_string(),
            tokens: response.usage.total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounded_core::AppError;
    use grounded_knowledge::Chunk;
    use grounded_llm::{LlmResponse, LlmUsage};
    use grounded_prompt::{builtin_prompt, GROUNDED_ANSWER_PROMPT_ID};
    use std::sync::Mutex;

    /// Echoes a fixed reply and keeps the last request.
    struct StubClient {
        reply: Result<String, String>,
        seen: Mutex<Option<LlmRequest>>,
    }

    impl StubClient {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(None),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmClient for StubClient {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            *self.seen.lock().unwrap() = Some(request.clone());
            match &self.reply {
                Ok(text) => Ok(LlmResponse {
                    content: text.clone(),
                    model: String::new(),
                    usage: LlmUsage::new(40, 8),
                    done: true,
                }),
                Err(message) => Err(AppError::Llm(message.clone())),
            }
        }
    }

    fn evidence() -> Vec<ScoredChunk> {
        vec![ScoredChunk {
            chunk: Chunk {
                id: "chunk-1".to_string(),
                document_id: "doc-1".to_string(),
                position: 0,
                content: "The warranty period is 2 years.".to_string(),
                embedding: Vec::new(),
                metadata: serde_json::json!({ "source_document": "warranty.pdf", "page": 3 }),
            },
            score: 0.92,
        }]
    }

    fn generator(client: Arc<StubClient>) -> LlmAnswerGenerator {
        let prompt = builtin_prompt(GROUNDED_ANSWER_PROMPT_ID).unwrap().unwrap();
        LlmAnswerGenerator::new(client, prompt, &PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_prompt_carries_evidence_and_question() {
        let client = StubClient::replying("  The warranty period is 2 years.\n");
        let answer = generator(Arc::clone(&client))
            .generate("What is the warranty period?", &evidence())
            .await
            .unwrap();

        assert_eq!(answer.text, "The warranty period is 2 years.");
        assert_eq!(answer.model, "llama3.2");
        assert_eq!(answer.provider, "stub");
        assert_eq!(answer.tokens, 48);

        let request = client.seen.lock().unwrap().clone().unwrap();
        assert!(request.prompt.contains("[1] (warranty.pdf, page 3)"));
        assert!(request.prompt.contains("What is the warranty period?"));
        assert!(request.system.is_some());
        assert_eq!(request.max_tokens, Some(512));
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_response() {
        let client = StubClient::replying("   ");
        let err = generator(client).generate("q", &evidence()).await.unwrap_err();
        assert_eq!(err, GenerationError::EmptyResponse);
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let client = StubClient::failing("connection refused");
        let err = generator(client).generate("q", &evidence()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Provider(m) if m.contains("connection refused")));
    }
}
