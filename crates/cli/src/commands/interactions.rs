//! Interactions command handler.

use clap::{Args, Subcommand};
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_rag::{summarize, InteractionStore, SqliteInteractionStore};
use uuid::Uuid;

/// Browse recorded interactions
#[derive(Args, Debug)]
pub struct InteractionsCommand {
    #[command(subcommand)]
    pub action: InteractionsAction,
}

#[derive(Subcommand, Debug)]
pub enum InteractionsAction {
    /// List interactions, newest first
    List(InteractionsListCommand),
    /// Show one interaction as JSON
    Show(InteractionsShowCommand),
    /// Count interactions by status
    Stats(InteractionsStatsCommand),
}

#[derive(Args, Debug)]
pub struct InteractionsListCommand {
    /// Only interactions against this knowledge base
    #[arg(long = "kb")]
    pub knowledge_base: Option<String>,

    #[arg(long, default_value = "20")]
    pub limit: usize,

    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InteractionsShowCommand {
    /// Interaction id
    pub id: String,
}

#[derive(Args, Debug)]
pub struct InteractionsStatsCommand {
    /// Only interactions against this knowledge base
    #[arg(long = "kb")]
    pub knowledge_base: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Validation(format!("{} must be a UUID, got '{}'", what, raw)))
}

fn open_store(config: &AppConfig) -> AppResult<SqliteInteractionStore> {
    SqliteInteractionStore::open(&config.interactions_db_path())
        .map_err(|e| AppError::Store(e.to_string()))
}

impl InteractionsListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let kb_id = self
            .knowledge_base
            .as_deref()
            .map(|raw| parse_id(raw, "Knowledge base id"))
            .transpose()?;

        let interactions = open_store(config)?
            .list(kb_id.as_ref(), self.limit, self.offset)
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&interactions)?);
            return Ok(());
        }

        if interactions.is_empty() {
            println!("No interactions recorded");
            return Ok(());
        }

        for interaction in &interactions {
            println!(
                "{}  {}  {:<8}  {}",
                interaction.created_at.format("%Y-%m-%d %H:%M:%S"),
                interaction.id,
                interaction.status,
                interaction.question
            );
        }

        Ok(())
    }
}

impl InteractionsShowCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let id = parse_id(&self.id, "Interaction id")?;

        let interaction = open_store(config)?
            .get(&id)
            .await
            .map_err(|e| AppError::Store(e.to_string()))?
            .ok_or_else(|| AppError::Store(format!("Interaction {} not found", id)))?;

        println!("{}", serde_json::to_string_pretty(&interaction)?);
        Ok(())
    }
}

impl InteractionsStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let kb_id = self
            .knowledge_base
            .as_deref()
            .map(|raw| parse_id(raw, "Knowledge base id"))
            .transpose()?;

        let store = open_store(config)?;
        let summary = summarize(&store, kb_id.as_ref())
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if self.json {
            let output = serde_json::json!({
                "totalInteractions": summary.total,
                "answeredCount": summary.answered,
                "unknownCount": summary.unknown,
                "errorCount": summary.error,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Interactions: {}", summary.total);
            println!("  Answered: {}", summary.answered);
            println!("  Unknown: {}", summary.unknown);
            println!("  Error: {}", summary.error);
        }

        Ok(())
    }
}

impl InteractionsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            InteractionsAction::List(cmd) => cmd.execute(config).await,
            InteractionsAction::Show(cmd) => cmd.execute(config).await,
            InteractionsAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}
