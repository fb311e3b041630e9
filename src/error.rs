//! Error types for startup and for answering a question.
//!
//! Startup failures ([`InitError`]) are fatal for the process; question
//! failures ([`AskError`]) only fail the request that raised them.

use std::path::PathBuf;
use thiserror::Error;

use crate::extract::ExtractError;
use crate::generation::GenerationError;

/// Errors raised while building the knowledge base.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("environment variable {var} is not set")]
    MissingCredential { var: String },

    #[error("failed to read document {}: {source}", path.display())]
    DocumentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported document type: {} (expected .pdf, .txt or .md)", path.display())]
    UnsupportedDocument { path: PathBuf },

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("document {} contains no extractable text", path.display())]
    EmptyDocument { path: PathBuf },

    #[error("failed to embed document fragments: {0}")]
    Embedding(anyhow::Error),

    #[error("embedder returned {vectors} vectors for {fragments} fragments")]
    IndexMismatch { fragments: usize, vectors: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors raised while answering a single question.
#[derive(Error, Debug)]
pub enum AskError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("no relevant context found in the document")]
    NoContext,

    #[error("failed to embed question: {0}")]
    QueryEmbedding(anyhow::Error),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}
