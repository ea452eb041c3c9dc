//! Knowledge command handler.
//!
//! Populates and inspects local knowledge base indexes.

use clap::{Args, Subcommand};
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::IngestOptions;
use std::path::PathBuf;

/// Knowledge base management (local index)
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Ingest files into a knowledge base
    Ingest(KnowledgeIngestCommand),
    /// Remove every document from a knowledge base
    Clean(KnowledgeCleanCommand),
    /// Show knowledge base statistics
    Stats(KnowledgeStatsCommand),
}

/// Ingest files
#[derive(Args, Debug)]
pub struct KnowledgeIngestCommand {
    /// Knowledge base id (UUID); a new one is generated when omitted
    #[arg(long = "kb")]
    pub knowledge_base: Option<String>,

    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only ingest paths containing one of these substrings
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing one of these substrings
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Reset base before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeIngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let kb_id = self
            .knowledge_base
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        tracing::info!("Executing knowledge ingest for base '{}'", kb_id);

        let options = IngestOptions {
            kb_id: kb_id.clone(),
            paths: self.paths.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            reset: self.reset,
        };

        let stats = grounded_knowledge::ingest(&config.workspace, options).await?;

        if self.json {
            let output = serde_json::json!({
                "kbId": kb_id,
                "documentsCount": stats.documents_count,
                "skippedCount": stats.skipped_count,
                "chunksCount": stats.chunks_count,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", kb_id);
            println!(
                "Ingested {} documents ({} unchanged, {} chunks, {} bytes) in {:.2}s",
                stats.documents_count,
                stats.skipped_count,
                stats.chunks_count,
                stats.bytes_processed,
                stats.duration_secs
            );
        }

        Ok(())
    }
}

/// Clean knowledge base
#[derive(Args, Debug)]
pub struct KnowledgeCleanCommand {
    /// Knowledge base id (UUID)
    pub knowledge_base: String,
}

impl KnowledgeCleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        grounded_knowledge::clean(&config.workspace, &self.knowledge_base)?;
        println!("Knowledge base '{}' cleaned", self.knowledge_base);
        Ok(())
    }
}

/// Show knowledge base stats
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Knowledge base id (UUID)
    pub knowledge_base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let stats = grounded_knowledge::stats(&config.workspace, &self.knowledge_base)?;

        if self.json {
            let output = serde_json::json!({
                "kbId": stats.kb_id,
                "documentsCount": stats.documents_count,
                "chunksCount": stats.chunks_count,
                "dbSizeBytes": stats.db_size_bytes,
                "lastIngestedAt": stats.last_ingested_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", stats.kb_id);
            println!("  Documents: {}", stats.documents_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(last) = stats.last_ingested_at {
                println!("  Last ingest: {}", last);
            }
        }

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Ingest(cmd) => cmd.execute(config).await,
            KnowledgeAction::Clean(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}
