//! Interaction persistence.
//!
//! Interactions are append-only: each id is written once, after the pipeline
//! reached a terminal state.

use crate::domain::{Citation, Interaction, InteractionStatus};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Persist a finalized interaction. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn save(&self, interaction: &Interaction) -> Result<(), StoreError>;

    async fn get(&self, id: &Uuid) -> Result<Option<Interaction>, StoreError>;

    /// Newest first, optionally restricted to one knowledge base.
    async fn list(
        &self,
        kb_id: Option<&Uuid>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Interaction>, StoreError>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS interactions (
        id TEXT PRIMARY KEY,
        kb_id TEXT NOT NULL,
        question TEXT NOT NULL,
        answer TEXT,
        status TEXT NOT NULL,
        citations TEXT NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_interactions_kb_created
        ON interactions(kb_id, created_at);
";

const SELECT_COLUMNS: &str =
    "SELECT id, kb_id, question, answer, status, citations, error, created_at FROM interactions";

/// SQLite store in `.grounded/interactions.sqlite`.
#[derive(Clone)]
pub struct SqliteInteractionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteInteractionStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{:?}: {}", parent, e)))?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Opened interaction store at {:?}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

type InteractionRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    String,
);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InteractionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_interaction(row: InteractionRow) -> Result<Interaction, StoreError> {
    let (id, kb_id, question, answer, status, citations, error, created_at) = row;

    let parse_uuid = |raw: &str| {
        Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad id '{}': {}", raw, e)))
    };
    let citations: Vec<Citation> = serde_json::from_str(&citations)
        .map_err(|e| StoreError::Corrupt(format!("bad citations for {}: {}", id, e)))?;
    let status = InteractionStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("bad status '{}' for {}", status, id)))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp for {}: {}", id, e)))?
        .with_timezone(&Utc);

    Ok(Interaction {
        id: parse_uuid(&id)?,
        kb_id: parse_uuid(&kb_id)?,
        question,
        answer,
        status,
        citations,
        error,
        created_at,
    })
}

#[async_trait]
impl InteractionStore for SqliteInteractionStore {
    async fn save(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let interaction = interaction.clone();
        let citations = serde_json::to_string(&interaction.citations)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        self.with_conn(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM interactions WHERE id = ?1",
                    params![interaction.id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::Duplicate(interaction.id));
            }

            conn.execute(
                "INSERT INTO interactions
                    (id, kb_id, question, answer, status, citations, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    interaction.id.to_string(),
                    interaction.kb_id.to_string(),
                    interaction.question,
                    interaction.answer,
                    interaction.status.as_str(),
                    citations,
                    interaction.error,
                    interaction
                        .created_at
                        .to_rfc3339_opts(SecondsFormat::Nanos, true),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Interaction>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                read_row,
            )
            .optional()?
            .map(into_interaction)
            .transpose()
        })
        .await
    }

    async fn list(
        &self,
        kb_id: Option<&Uuid>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Interaction>, StoreError> {
        let kb_id = kb_id.map(Uuid::to_string);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR kb_id = ?1)
                 ORDER BY created_at DESC, id ASC LIMIT ?2 OFFSET ?3",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![kb_id, limit, offset], read_row)?;

            let mut interactions = Vec::new();
            for row in rows {
                interactions.push(into_interaction(row?)?);
            }
            Ok(interactions)
        })
        .await
    }
}

/// Process-local store used in tests and dry runs.
#[derive(Default)]
pub struct InMemoryInteractionStore {
    interactions: RwLock<Vec<Interaction>>,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.interactions.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("interaction list lock poisoned".to_string())
}

#[async_trait]
impl InteractionStore for InMemoryInteractionStore {
    async fn save(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let mut interactions = self.interactions.write().map_err(poisoned)?;
        if interactions.iter().any(|i| i.id == interaction.id) {
            return Err(StoreError::Duplicate(interaction.id));
        }
        interactions.push(interaction.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Interaction>, StoreError> {
        let interactions = self.interactions.read().map_err(poisoned)?;
        Ok(interactions.iter().find(|i| &i.id == id).cloned())
    }

    async fn list(
        &self,
        kb_id: Option<&Uuid>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Interaction>, StoreError> {
        let interactions = self.interactions.read().map_err(poisoned)?;
        let mut matching: Vec<&Interaction> = interactions
            .iter()
            .filter(|i| kb_id.map_or(true, |kb| &i.kb_id == kb))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Interaction counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionSummary {
    pub total: usize,
    pub answered: usize,
    pub unknown: usize,
    pub error: usize,
}

impl InteractionSummary {
    fn count(&mut self, status: InteractionStatus) {
        self.total += 1;
        match status {
            InteractionStatus::Answered => self.answered += 1,
            InteractionStatus::Unknown => self.unknown += 1,
            InteractionStatus::Error => self.error += 1,
        }
    }
}

const SUMMARY_PAGE: usize = 500;

/// Count every stored interaction by status, optionally for one knowledge base.
pub async fn summarize(
    store: &dyn InteractionStore,
    kb_id: Option<&Uuid>,
) -> Result<InteractionSummary, StoreError> {
    let mut summary = InteractionSummary::default();
    let mut offset = 0;
    loop {
        let page = store.list(kb_id, SUMMARY_PAGE, offset).await?;
        for interaction in &page {
            summary.count(interaction.status);
        }
        if page.len() < SUMMARY_PAGE {
            return Ok(summary);
        }
        offset += page.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InteractionDraft;
    use chrono::Duration;
    use tempfile::TempDir;

    fn answered(kb: Uuid, question: &str, minutes_ago: i64) -> Interaction {
        let mut draft = InteractionDraft::open(kb, question);
        draft.created_at = Utc::now() - Duration::minutes(minutes_ago);
        draft.answered(
            "The warranty period is 2 years.".to_string(),
            vec![Citation {
                source_document: "warranty.pdf".to_string(),
                page: Some(3),
                chunk_id: "c1".to_string(),
                relevance_score: 0.91,
            }],
        )
    }

    async fn exercise(store: &dyn InteractionStore) {
        let kb_a = Uuid::new_v4();
        let kb_b = Uuid::new_v4();
        let old = answered(kb_a, "old", 30);
        let new = answered(kb_a, "new", 1);
        let other = InteractionDraft::open(kb_b, "other").failed("retrieval failed");

        store.save(&old).await.unwrap();
        store.save(&new).await.unwrap();
        store.save(&other).await.unwrap();

        assert_eq!(store.get(&old.id).await.unwrap(), Some(old.clone()));
        assert_eq!(store.get(&Uuid::new_v4()).await.unwrap(), None);

        let listed = store.list(Some(&kb_a), 10, 0).await.unwrap();
        let questions: Vec<&str> = listed.iter().map(|i| i.question.as_str()).collect();
        assert_eq!(questions, vec!["new", "old"]);

        assert_eq!(store.list(None, 10, 0).await.unwrap().len(), 3);
        assert_eq!(store.list(Some(&kb_a), 1, 1).await.unwrap()[0].id, old.id);

        let duplicate = store.save(&new).await.unwrap_err();
        assert_eq!(duplicate, StoreError::Duplicate(new.id));
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = SqliteInteractionStore::open(&temp.path().join(".grounded/interactions.sqlite"))
            .unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn test_summarize_counts_by_status() {
        let store = InMemoryInteractionStore::new();
        let kb_a = Uuid::new_v4();
        let kb_b = Uuid::new_v4();
        for i in 0..(SUMMARY_PAGE + 2) {
            store.save(&answered(kb_a, "q", i as i64)).await.unwrap();
        }
        store
            .save(&InteractionDraft::open(kb_a, "mars").unknown())
            .await
            .unwrap();
        store
            .save(&InteractionDraft::open(kb_b, "down").failed("retrieval failed"))
            .await
            .unwrap();

        let all = summarize(&store, None).await.unwrap();
        assert_eq!(
            all,
            InteractionSummary {
                total: SUMMARY_PAGE + 4,
                answered: SUMMARY_PAGE + 2,
                unknown: 1,
                error: 1,
            }
        );

        let only_b = summarize(&store, Some(&kb_b)).await.unwrap();
        assert_eq!(only_b.total, 1);
        assert_eq!(only_b.error, 1);

        let empty = summarize(&store, Some(&Uuid::new_v4())).await.unwrap();
        assert_eq!(empty, InteractionSummary::default());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryInteractionStore::new();
        exercise(&store).await;
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("interactions.sqlite");
        let interaction = answered(Uuid::new_v4(), "persisted?", 0);

        SqliteInteractionStore::open(&path)
            .unwrap()
            .save(&interaction)
            .await
            .unwrap();

        let reopened = SqliteInteractionStore::open(&path).unwrap();
        assert_eq!(reopened.get(&interaction.id).await.unwrap(), Some(interaction));
    }
}
