//! Prompt system for Grounded.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions (workspace overrides in `.grounded/prompts/`)
//! - A built-in grounded-answer prompt
//! - Handlebars template rendering over the question and retrieved evidence

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{builtin_prompt, GROUNDED_ANSWER_PROMPT_ID};
pub use loader::{load_prompt, load_prompt_or_builtin};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptChunk, PromptContext, PromptDefinition,
    PromptOutputSpec,
};
