//! Immutable in-memory vector index.
//!
//! Built once from fragments and their embeddings, then only read. Search
//! is brute-force cosine similarity over every stored vector, which is
//! plenty for a single document of a few hundred pages.

use crate::error::InitError;
use crate::models::{Fragment, ScoredFragment};

struct StoredVector {
    fragment: Fragment,
    vector: Vec<f32>,
}

/// Fragment index with nearest-neighbour lookup. Has no mutating methods.
pub struct VectorStore {
    entries: Vec<StoredVector>,
    dims: usize,
}

impl VectorStore {
    /// Pairs fragments with their vectors, in order.
    ///
    /// Fails if the counts differ or the vectors do not all share one
    /// dimensionality.
    pub fn build(fragments: Vec<Fragment>, vectors: Vec<Vec<f32>>) -> Result<Self, InitError> {
        if fragments.len() != vectors.len() {
            return Err(InitError::IndexMismatch {
                fragments: fragments.len(),
                vectors: vectors.len(),
            });
        }

        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(InitError::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }

        let entries = fragments
            .into_iter()
            .zip(vectors)
            .map(|(fragment, vector)| StoredVector { fragment, vector })
            .collect();

        Ok(Self { entries, dims })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Fragments in document order.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.entries.iter().map(|e| &e.fragment)
    }

    /// The `k` fragments most similar to `query_vec`, best first.
    ///
    /// Equal scores keep document order. Candidates below `min_score` are
    /// dropped before truncation.
    pub fn search(&self, query_vec: &[f32], k: usize, min_score: Option<f32>) -> Vec<ScoredFragment> {
        let mut candidates: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query_vec, &e.vector)))
            .filter(|(_, score)| min_score.map_or(true, |min| *score >= min))
            .collect();

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(k);

        candidates
            .into_iter()
            .map(|(i, score)| ScoredFragment {
                fragment: self.entries[i].fragment.clone(),
                score,
            })
            .collect()
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
