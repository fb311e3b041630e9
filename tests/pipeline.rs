//! End-to-end pipeline tests with deterministic in-process providers.

mod common;

use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

use askpdf::embedding::Embedder;
use askpdf::error::{AskError, InitError};
use askpdf::generation::GenerationError;
use askpdf::knowledge::KnowledgeBase;
use common::*;

#[tokio::test]
async fn answers_with_top_three_sources_best_first() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&write_act(tmp.path()));
    let generator = Arc::new(RecordingGenerator::answering("Officers take an oath."));
    let kb = build_kb(&config, Arc::new(KeywordEmbedder::default()), generator.clone()).await;

    let answer = kb.ask("How is the oath taken?").await.unwrap();

    assert_eq!(answer.answer, "Officers take an oath.");
    assert_eq!(answer.question, "How is the oath taken?");
    let pages: Vec<usize> = answer.sources.iter().map(|s| s.fragment.page).collect();
    assert_eq!(pages, vec![0, 1, 2]);
    assert_eq!(generator.calls(), 1);

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.starts_with("Answer the question based only on the following context:\n"));
    assert!(prompt.contains("Every officer shall take an oath of allegiance."));
    assert!(prompt.ends_with("Question: How is the oath taken?\n"));
}

#[tokio::test]
async fn blank_question_calls_no_provider() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&write_act(tmp.path()));
    let embedder = Arc::new(KeywordEmbedder::default());
    let generator = Arc::new(RecordingGenerator::answering("unused"));
    let kb = build_kb(&config, embedder.clone(), generator.clone()).await;

    for question in ["", "   ", "\n\t"] {
        let err = kb.ask(question).await.unwrap_err();
        assert!(matches!(err, AskError::EmptyQuestion));
    }
    assert_eq!(embedder.query_calls.load(Ordering::SeqCst), 0);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn context_follows_retrieval_rank() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&write_act(tmp.path()));
    let generator = Arc::new(RecordingGenerator::answering("ok"));
    let kb = build_kb(&config, Arc::new(KeywordEmbedder::default()), generator.clone()).await;

    kb.ask("complaint about a transfer").await.unwrap();

    let prompt = generator.last_prompt().unwrap();
    let transfer = prompt.find("A transfer order").unwrap();
    let complaint = prompt.find("Any complaint").unwrap();
    assert!(transfer < complaint, "equal scores keep document order");
}

#[tokio::test]
async fn top_k_is_configurable() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_for(&write_act(tmp.path()));
    config.retrieval.top_k = 1;
    let generator = Arc::new(RecordingGenerator::answering("ok"));
    let kb = build_kb(&config, Arc::new(KeywordEmbedder::default()), generator).await;

    let answer = kb.ask("what about salary?").await.unwrap();
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].fragment.page, 1);
}

#[tokio::test]
async fn no_context_skips_generation() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_for(&write_act(tmp.path()));
    config.retrieval.min_score = Some(0.5);
    let generator = Arc::new(RecordingGenerator::answering("unused"));
    let kb = build_kb(&config, Arc::new(KeywordEmbedder::default()), generator.clone()).await;

    let err = kb.ask("who wrote this?").await.unwrap_err();
    assert!(matches!(err, AskError::NoContext));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generation_failure_is_typed() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&write_act(tmp.path()));
    let generator = Arc::new(RecordingGenerator::failing(|| {
        GenerationError::Unavailable("connection refused".to_string())
    }));
    let kb = build_kb(&config, Arc::new(KeywordEmbedder::default()), generator.clone()).await;

    let err = kb.ask("oath?").await.unwrap_err();
    assert!(matches!(
        err,
        AskError::Generation(GenerationError::Unavailable(_))
    ));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn empty_reply_is_not_a_success() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&write_act(tmp.path()));
    let generator = Arc::new(RecordingGenerator::failing(|| GenerationError::Empty));
    let kb = build_kb(&config, Arc::new(KeywordEmbedder::default()), generator).await;

    assert!(matches!(
        kb.ask("oath?").await,
        Err(AskError::Generation(GenerationError::Empty))
    ));
}

#[tokio::test]
async fn missing_document_fails_before_embedding() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp.path().join("absent.pdf"));
    let embedder = Arc::new(KeywordEmbedder::default());
    let result = KnowledgeBase::build(
        &config,
        embedder.clone(),
        Arc::new(RecordingGenerator::answering("unused")),
    )
    .await;

    assert!(matches!(result, Err(InitError::DocumentRead { .. })));
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unexpected_dimensions_fail_startup() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_for(&write_act(tmp.path()));
    config.embedding.dims = Some(768);
    let result = KnowledgeBase::build(
        &config,
        Arc::new(KeywordEmbedder::default()),
        Arc::new(RecordingGenerator::answering("unused")),
    )
    .await;

    assert!(matches!(result, Err(InitError::Embedding(_))));
}

#[tokio::test]
async fn fragments_embedded_in_batches() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_for(&write_act(tmp.path()));
    config.embedding.batch_size = 2;
    let embedder = Arc::new(KeywordEmbedder::default());
    let kb = build_kb(
        &config,
        embedder.clone(),
        Arc::new(RecordingGenerator::answering("ok")),
    )
    .await;

    assert_eq!(kb.len(), 5);
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rebuild_reflects_changed_document() {
    let tmp = TempDir::new().unwrap();
    let path = write_act(tmp.path());
    let config = config_for(&path);

    let first = build_kb(
        &config,
        Arc::new(KeywordEmbedder::default()),
        Arc::new(RecordingGenerator::answering("ok")),
    )
    .await;

    std::fs::write(&path, "Schedule. Uniform colours for each rank.").unwrap();
    let second = build_kb(
        &config,
        Arc::new(KeywordEmbedder::default()),
        Arc::new(RecordingGenerator::answering("ok")),
    )
    .await;

    assert_ne!(first.fingerprint(), second.fingerprint());
    assert_eq!(second.len(), 1);
    let texts: Vec<&str> = second.fragments().map(|f| f.text.as_str()).collect();
    assert_eq!(texts, vec!["Schedule. Uniform colours for each rank."]);
}

#[tokio::test]
async fn pdf_document_is_indexed() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("act.pdf");
    std::fs::write(&path, minimal_pdf_with_phrase("oath of office")).unwrap();
    let config = config_for(&path);
    let kb = build_kb(
        &config,
        Arc::new(KeywordEmbedder::default()),
        Arc::new(RecordingGenerator::answering("ok")),
    )
    .await;

    assert_eq!(kb.pages(), 1);
    let first = kb.fragments().next().unwrap();
    assert_eq!(first.page, 0);
    assert!(first.text.contains("oath"), "extracted: {:?}", first.text);
}

/// Embeds documents with the keyword vocabulary but queries in two dimensions.
struct ShortQueryEmbedder;

#[async_trait]
impl Embedder for ShortQueryEmbedder {
    fn model_name(&self) -> &str {
        "short-query"
    }

    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    async fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

#[tokio::test]
async fn query_dimension_mismatch_fails_before_generation() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&write_act(tmp.path()));
    let generator = Arc::new(RecordingGenerator::answering("unused"));
    let kb = KnowledgeBase::build(&config, Arc::new(ShortQueryEmbedder), generator.clone())
        .await
        .unwrap();

    let err = kb.ask("oath?").await.unwrap_err();
    assert!(matches!(err, AskError::QueryEmbedding(_)));
    assert!(err.to_string().contains("7-dimensional"), "{}", err);
    assert_eq!(generator.calls(), 0);
}
