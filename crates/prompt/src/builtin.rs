//! Prompts shipped with the binary.
//!
//! A workspace file with the same id in `.grounded/prompts/` takes precedence.

use crate::types::PromptDefinition;
use grounded_core::{AppError, AppResult};

pub const GROUNDED_ANSWER_PROMPT_ID: &str = "rag.grounded_answer";

const GROUNDED_ANSWER_YAML: &str = r#"
id: rag.grounded_answer
title: Grounded answer
apiVersion: "1.0"
createdBy: grounded
system: |
  You answer questions using only the numbered context passages provided.
  If the passages do not contain the answer, reply exactly:
  "I don't have that information in the provided knowledge base."
  Do not use outside knowledge. Do not speculate. Keep answers short and factual.
template: |
  Context:
  {{#each chunks}}
  [{{index}}] ({{source}}{{#if page}}, page {{page}}{{/if}})
  {{content}}

  {{/each}}
  Question: {{question}}

  Answer:
output:
  format: text
"#;

/// Look up a built-in prompt definition by id.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<Option<PromptDefinition>> {
    match prompt_id {
        GROUNDED_ANSWER_PROMPT_ID => {
            let def: PromptDefinition = serde_yaml::from_str(GROUNDED_ANSWER_YAML)
                .map_err(|e| AppError::Prompt(format!("Invalid built-in prompt: {}", e)))?;
            Ok(Some(def))
        }
        _ => Ok(None),
    }
}
