//! Exact brute-force vector index
//!
//! Scores every stored vector against the query. Persisted as a single
//! `index.json` next to the tenant's record file.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::index::{Metric, ScoredId, VectorIndex, validate_batch};
use crate::memory::types::{Embedding, RecordId};
use crate::storage;

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    dimension: usize,
    metric: Metric,
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    id: RecordId,
    vector: Embedding,
}

/// In-memory exact k-NN index
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    entries: BTreeMap<RecordId, Embedding>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            entries: BTreeMap::new(),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Vector stored under `id`, if any
    pub fn get(&self, id: &str) -> Option<&Embedding> {
        self.entries.get(id)
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn ids(&self) -> Vec<RecordId> {
        self.entries.keys().cloned().collect()
    }

    async fn add(&mut self, ids: &[RecordId], vectors: &[Embedding]) -> Result<()> {
        validate_batch(self.dimension, ids, vectors)?;

        for (id, vector) in ids.iter().zip(vectors.iter()) {
            self.entries.insert(id.clone(), vector.clone());
        }

        Ok(())
    }

    async fn delete(&mut self, ids: &[RecordId]) -> Result<bool> {
        let mut all_found = true;
        for id in ids {
            if self.entries.remove(id).is_none() {
                all_found = false;
            }
        }
        Ok(all_found)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(StrataError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<ScoredId> = self
            .entries
            .iter()
            .map(|(id, vector)| ScoredId {
                id: id.clone(),
                score: self.metric.score(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            self.metric
                .rank(a.score, b.score)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn save(&self, path: &Path) -> Result<()> {
        let persisted = PersistedIndex {
            dimension: self.dimension,
            metric: self.metric,
            entries: self
                .entries
                .iter()
                .map(|(id, vector)| PersistedEntry {
                    id: id.clone(),
                    vector: vector.clone(),
                })
                .collect(),
        };

        storage::write_json_atomic(&path.join(INDEX_FILE), &persisted)
    }

    async fn load(&mut self, path: &Path) -> Result<()> {
        let persisted: PersistedIndex = storage::read_json(&path.join(INDEX_FILE))?;

        if persisted.dimension != self.dimension {
            return Err(StrataError::DimensionMismatch {
                expected: self.dimension,
                actual: persisted.dimension,
            });
        }

        if persisted.metric != self.metric {
            tracing::warn!(
                "Index at {} was saved with {:?}, scoring with configured {:?}",
                path.display(),
                persisted.metric,
                self.metric
            );
        }

        let mut entries = BTreeMap::new();
        for entry in persisted.entries {
            if entry.vector.len() != self.dimension {
                return Err(StrataError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
            entries.insert(entry.id, entry.vector);
        }

        self.entries = entries;
        Ok(())
    }
}
