//! Data types that flow through the question-answering pipeline.

use serde::Serialize;

/// A span of extracted text together with where it came from.
///
/// Fragments never span two pages. They are created once when the
/// knowledge base is built and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    /// `p{page}-c{chunk_index}`, unique within one document.
    pub id: String,
    /// Document path as configured.
    pub source: String,
    /// Zero-based page number.
    pub page: usize,
    /// Zero-based position within the page.
    pub chunk_index: usize,
    pub text: String,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
}

/// A retrieved fragment with its cosine similarity to the question.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFragment {
    #[serde(flatten)]
    pub fragment: Fragment,
    pub score: f32,
}

/// A generated answer and the context it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<ScoredFragment>,
}
