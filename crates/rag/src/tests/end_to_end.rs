//! Full pipeline over a real ingested knowledge base and interaction store.

use super::fakes::{FakeGenerator, KB};
use crate::audit::TracingAuditRecorder;
use crate::config::PipelineConfig;
use crate::domain::InteractionStatus;
use crate::grounding::LexicalGroundingEvaluator;
use crate::orchestrator::QueryOrchestrator;
use crate::request::QueryRequest;
use crate::retriever::IndexRetriever;
use crate::store::{InteractionStore, SqliteInteractionStore};
use grounded_knowledge::IngestOptions;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

async fn ingested_workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("warranty.txt"),
        "Warranty terms.\u{000C}The warranty period is 2 years from the date of purchase.",
    )
    .unwrap();
    fs::write(
        docs.join("returns.md"),
        "Returns are accepted within 30 days with the original receipt.",
    )
    .unwrap();

    grounded_knowledge::ingest(
        temp.path(),
        IngestOptions {
            kb_id: KB.to_string(),
            paths: vec![docs],
            include: Vec::new(),
            exclude: Vec::new(),
            reset: false,
        },
    )
    .await
    .unwrap();

    temp
}

fn pipeline(temp: &TempDir, answer: &str, store: Arc<SqliteInteractionStore>) -> QueryOrchestrator {
    let config = PipelineConfig {
        min_relevance_score: 0.0,
        ..Default::default()
    };
    QueryOrchestrator::new(
        config.clone(),
        Arc::new(IndexRetriever::new(temp.path().to_path_buf(), &config)),
        FakeGenerator::answering(answer),
        Arc::new(LexicalGroundingEvaluator::new()),
        Arc::new(TracingAuditRecorder::new(store)),
    )
}

#[tokio::test]
async fn test_answer_cites_paginated_source_and_is_persisted() {
    let temp = ingested_workspace().await;
    let store = Arc::new(
        SqliteInteractionStore::open(&temp.path().join(".grounded/interactions.sqlite")).unwrap(),
    );

    let response = pipeline(&temp, "The warranty period is 2 years.", store.clone())
        .execute(&QueryRequest::new(KB, "What is the warranty period?"))
        .await
        .unwrap();

    assert_eq!(response.status, InteractionStatus::Answered);
    assert!(response
        .citations
        .iter()
        .any(|c| c.source_document == "warranty.txt" && c.page == Some(2)));

    let id = Uuid::parse_str(&response.interaction_id).unwrap();
    let stored = store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, InteractionStatus::Answered);
    assert_eq!(stored.citations, response.citations);
    assert_eq!(stored.question, "What is the warranty period?");
}

#[tokio::test]
async fn test_unknown_base_is_error_and_persisted() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SqliteInteractionStore::in_memory().unwrap());

    let response = pipeline(&temp, "unused", store.clone())
        .execute(&QueryRequest::new(KB, "What is the warranty period?"))
        .await
        .unwrap();

    assert_eq!(response.status, InteractionStatus::Error);
    assert_eq!(response.error.as_deref(), Some("retrieval failed"));

    let listed = store.list(None, 10, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id.to_string(), response.interaction_id);
}
