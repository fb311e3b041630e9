//! The knowledge base: one document, indexed once, queried per question.
//!
//! ```text
//! build:  load → chunk → embed → VectorStore
//! ask:    embed question → top-k → prompt → generate → Answer
//! ```
//!
//! A [`KnowledgeBase`] is immutable after [`KnowledgeBase::build`] and is
//! shared across requests behind an `Arc`.

use anyhow::anyhow;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{create_embedder, embed_in_batches, Embedder};
use crate::error::{AskError, InitError};
use crate::generation::{create_generator, generate_with_retry, Generator};
use crate::loader::load_document;
use crate::models::{Answer, Fragment, ScoredFragment};
use crate::prompt::build_prompt;
use crate::store::VectorStore;

pub struct KnowledgeBase {
    document: String,
    fingerprint: String,
    pages: usize,
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    template: String,
    top_k: usize,
    min_score: Option<f32>,
    generation_retries: u32,
}

impl KnowledgeBase {
    /// Builds the providers named in `config`, then the knowledge base.
    pub async fn from_config(config: &Config) -> Result<Self, InitError> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Self::build(config, embedder, generator).await
    }

    /// Loads the configured document and embeds every fragment.
    pub async fn build(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, InitError> {
        let doc = load_document(&config.document.path, config.chunking.max_tokens)?;

        let texts: Vec<String> = doc.fragments.iter().map(|f| f.text.clone()).collect();
        let vectors = embed_in_batches(
            embedder.as_ref(),
            &texts,
            config.embedding.batch_size,
            config.embedding.dims,
        )
        .await
        .map_err(InitError::Embedding)?;

        let store = VectorStore::build(doc.fragments, vectors)?;
        tracing::info!(
            fragments = store.len(),
            dims = store.dims(),
            model = embedder.model_name(),
            "indexed document"
        );

        Ok(Self {
            document: config.document.path.display().to_string(),
            fingerprint: doc.fingerprint,
            pages: doc.pages,
            store,
            embedder,
            generator,
            template: config.prompt.template.clone(),
            top_k: config.retrieval.top_k,
            min_score: config.retrieval.min_score,
            generation_retries: config.generation.max_retries,
        })
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.store.fragments()
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn generation_model(&self) -> &str {
        self.generator.model_name()
    }

    /// The top-k fragments for `question`, best first.
    ///
    /// A query vector whose length differs from the index is an error.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredFragment>, AskError> {
        let query_vec = self
            .embedder
            .embed_query(question)
            .await
            .map_err(AskError::QueryEmbedding)?;
        if query_vec.len() != self.store.dims() {
            return Err(AskError::QueryEmbedding(anyhow!(
                "expected {}-dimensional query embedding, got {}",
                self.store.dims(),
                query_vec.len()
            )));
        }
        Ok(self.store.search(&query_vec, self.top_k, self.min_score))
    }

    /// Answers `question` from the document.
    ///
    /// A blank question fails with [`AskError::EmptyQuestion`] before any
    /// provider is called. Otherwise exactly one retrieval happens and, if it
    /// found context, one generation (plus configured retries).
    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        if question.trim().is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let sources = self.retrieve(question).await?;
        if sources.is_empty() {
            return Err(AskError::NoContext);
        }
        tracing::debug!(
            retrieved = sources.len(),
            top_score = sources[0].score,
            pages = ?sources.iter().map(|s| s.fragment.page).collect::<Vec<_>>(),
            "retrieved context"
        );

        let prompt = build_prompt(&self.template, &sources, question);
        let answer =
            generate_with_retry(self.generator.as_ref(), &prompt, self.generation_retries).await?;

        Ok(Answer {
            question: question.to_string(),
            answer,
            sources,
        })
    }
}
