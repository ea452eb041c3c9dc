//! Prompt types for Grounded.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// System message template (Handlebars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User message template (Handlebars)
    pub template: String,

    /// Expected output format
    pub output: PromptOutputSpec,
}

/// Expected output format for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format (e.g., "text", "markdown")
    pub format: String,
}

/// One retrieved chunk as exposed to templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptChunk {
    /// 1-based position in the evidence list
    pub index: usize,

    #[serde(rename = "chunkId")]
    pub chunk_id: String,

    /// Source document name
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    pub content: String,
}

/// Variables available to a prompt template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    pub question: String,
    pub chunks: Vec<PromptChunk>,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Number of evidence chunks rendered into the prompt
    #[serde(rename = "chunkCount")]
    pub chunk_count: usize,
}
