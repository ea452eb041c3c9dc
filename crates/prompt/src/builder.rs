//! Prompt builder for rendering templates over the question and evidence.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptContext, PromptDefinition};
use grounded_core::{AppError, AppResult};
use handlebars::Handlebars;

/// Build a prompt from a definition and the template context.
///
/// Both the system and user templates are rendered with the same variables:
/// `question` and `chunks` (each with `index`, `chunkId`, `source`, `page`, `content`).
///
/// # Example
/// ```no_run
/// use grounded_prompt::{build_prompt, PromptContext, PromptDefinition};
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = PromptContext {
///     question: "What is the refund window?".to_string(),
///     chunks: Vec::new(),
/// };
/// let built = build_prompt(&def, &ctx)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, context: &PromptContext) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        prompt_id = %definition.id,
        chunk_count = context.chunks.len(),
        "Building prompt"
    );

    let variables = serde_json::to_value(context)
        .map_err(|e| AppError::Prompt(format!("Failed to serialize prompt context: {}", e)))?;

    let user = render_template(&definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|tpl| render_template(tpl, &variables))
        .transpose()?;

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            chunk_count: context.chunks.len(),
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &serde_json::Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
