//! Ask command handler.
//!
//! Runs one grounded query and prints the response JSON on stdout.

use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_llm::create_client;
use grounded_rag::{
    IndexRetriever, LexicalGroundingEvaluator, LlmAnswerGenerator, PipelineConfig,
    QueryOrchestrator, QueryRequest, SqliteInteractionStore, TracingAuditRecorder,
};
use std::sync::Arc;
use std::time::Duration;

/// Ask a question against a knowledge base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Knowledge base id (UUID)
    #[arg(long = "kb", env = "GROUNDED_KB")]
    pub knowledge_base: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum grounding confidence (0.0-1.0)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Print single-line JSON
    #[arg(long)]
    pub compact: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let mut settings = config.pipeline.clone();
        if let Some(top_k) = self.top_k {
            settings.top_k = top_k;
        }
        if let Some(threshold) = self.threshold {
            settings.confidence_threshold = threshold;
        }
        settings.validate()?;

        let pipeline_config = PipelineConfig::from_settings(&settings, &config.provider, &config.model);
        let orchestrator = build_orchestrator(config, &pipeline_config)?;

        let request = QueryRequest::new(&self.knowledge_base, &self.question);

        // Ctrl-C abandons the query; it is still recorded as cancelled
        let cancelled = async {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::debug!("Ctrl-C handler unavailable, query is not cancellable");
                std::future::pending::<()>().await;
            }
        };

        let response = orchestrator.execute_until(&request, cancelled).await?;

        let output = if self.compact {
            serde_json::to_string(&response)?
        } else {
            serde_json::to_string_pretty(&response)?
        };
        println!("{}", output);

        Ok(())
    }
}

fn build_orchestrator(config: &AppConfig, pipeline: &PipelineConfig) -> AppResult<QueryOrchestrator> {
    let timeout = config
        .provider_timeout_secs()
        .map(Duration::from_secs)
        .unwrap_or(pipeline.generation_timeout);
    let client = create_client(
        &config.provider,
        config.endpoint.as_deref(),
        config.api_key.as_deref(),
        Some(timeout),
    )
    .map_err(AppError::Llm)?;

    let store = SqliteInteractionStore::open(&config.interactions_db_path())
        .map_err(|e| AppError::Store(e.to_string()))?;

    let generator = LlmAnswerGenerator::from_workspace(client, &config.workspace, pipeline)?;

    Ok(QueryOrchestrator::new(
        pipeline.clone(),
        Arc::new(IndexRetriever::new(config.workspace.clone(), pipeline)),
        Arc::new(generator),
        Arc::new(LexicalGroundingEvaluator::new()),
        Arc::new(TracingAuditRecorder::new(Arc::new(store))),
    ))
}
