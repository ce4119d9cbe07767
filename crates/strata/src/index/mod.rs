//! Vector index abstraction
//!
//! A `VectorIndex` maps record ids to embeddings and answers k-nearest-neighbor
//! queries. Backends are selected at construction time through `IndexKind`.

pub mod flat;
#[cfg(feature = "lance")]
pub mod lance;

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::memory::types::{Embedding, RecordId};

pub use flat::FlatIndex;
#[cfg(feature = "lance")]
pub use lance::LanceIndex;

/// A search hit: record id plus its backend-defined score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: RecordId,
    pub score: f32,
}

/// Available index backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact brute-force search held in memory, persisted as JSON
    #[default]
    Flat,
    /// LanceDB table, persisted as a Lance dataset
    Lance,
}

/// Similarity metric used by the flat backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity, higher is better
    #[default]
    Cosine,
    /// Euclidean distance, lower is better
    L2,
}

impl Metric {
    /// Score `candidate` against `query`
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(query, candidate),
            Metric::L2 => l2_distance(query, candidate),
        }
    }

    /// Order two scores so that the better one sorts first
    pub fn rank(&self, a: f32, b: f32) -> Ordering {
        match self {
            Metric::Cosine => b.total_cmp(&a),
            Metric::L2 => a.total_cmp(&b),
        }
    }
}

/// Storage-agnostic embedding index keyed by record id
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Configured embedding length
    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored ids in ascending order
    fn ids(&self) -> Vec<RecordId>;

    /// Insert or replace vectors; all-or-nothing on validation failure
    async fn add(&mut self, ids: &[RecordId], vectors: &[Embedding]) -> Result<()>;

    /// Remove ids; returns true only if every requested id was present
    async fn delete(&mut self, ids: &[RecordId]) -> Result<bool>;

    /// Up to `k` nearest ids, best match first
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>>;

    /// Persist into the tenant directory `path`
    async fn save(&self, path: &Path) -> Result<()>;

    /// Replace contents with what was saved under `path`
    async fn load(&mut self, path: &Path) -> Result<()>;
}

/// Build an empty index of the requested kind
pub fn build_index(
    kind: IndexKind,
    dimension: usize,
    metric: Metric,
) -> Result<Box<dyn VectorIndex>> {
    if dimension == 0 {
        return Err(StrataError::InvalidArgument(
            "embedding dimension must be positive".to_string(),
        ));
    }

    match kind {
        IndexKind::Flat => Ok(Box::new(FlatIndex::new(dimension, metric))),
        #[cfg(feature = "lance")]
        IndexKind::Lance => Ok(Box::new(LanceIndex::new(dimension)?)),
        #[cfg(not(feature = "lance"))]
        IndexKind::Lance => Err(StrataError::Config(
            "index kind 'lance' requires the `lance` feature".to_string(),
        )),
    }
}

/// Shared validation for `add`
pub(crate) fn validate_batch(dimension: usize, ids: &[RecordId], vectors: &[Embedding]) -> Result<()> {
    if ids.len() != vectors.len() {
        return Err(StrataError::InvalidArgument(format!(
            "{} ids but {} vectors",
            ids.len(),
            vectors.len()
        )));
    }

    for vector in vectors {
        if vector.len() != dimension {
            return Err(StrataError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
    }

    Ok(())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
