//! LanceDB-backed vector index
//!
//! The live table sits in a private scratch directory owned by the index.
//! `save` snapshots it into `{tenant_dir}/lance`, `load` copies a snapshot
//! back into scratch. Scores are LanceDB's `_distance` (L2, lower is better).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::Table;
use lancedb::query::{ExecutableQuery, QueryBase};
use tempfile::TempDir;
use tokio::sync::OnceCell;

use crate::error::{Result, StrataError};
use crate::index::{ScoredId, VectorIndex, validate_batch};
use crate::memory::types::{Embedding, RecordId};
use crate::storage;

const VECTORS_TABLE: &str = "vectors";
const SNAPSHOT_DIR: &str = "lance";

pub struct LanceIndex {
    dimension: usize,
    scratch: TempDir,
    table: OnceCell<Table>,
    ids: BTreeSet<RecordId>,
}

impl LanceIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("strata-lance-").tempdir()?;
        Ok(Self {
            dimension,
            scratch,
            table: OnceCell::new(),
            ids: BTreeSet::new(),
        })
    }

    fn schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
        ]))
    }

    fn to_batch(dimension: usize, ids: &[RecordId], vectors: &[Embedding]) -> Result<RecordBatch> {
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let values: Vec<Option<Vec<Option<f32>>>> = vectors
            .iter()
            .map(|v| Some(v.iter().map(|&x| Some(x)).collect()))
            .collect();

        RecordBatch::try_new(
            Self::schema(dimension),
            vec![
                Arc::new(StringArray::from(id_refs)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(values, dimension as i32)),
            ],
        )
        .map_err(|e| StrataError::Storage(format!("Failed to create RecordBatch: {e}")))
    }

    async fn connect(path: &Path) -> Result<lancedb::Connection> {
        let uri = path
            .to_str()
            .ok_or_else(|| StrataError::Storage("Invalid path encoding".to_string()))?;

        lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| StrataError::Storage(format!("Failed to connect to LanceDB: {e}")))
    }

    async fn create_table(
        connection: &lancedb::Connection,
        dimension: usize,
        batch: RecordBatch,
    ) -> Result<Table> {
        let schema = Self::schema(dimension);
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        connection
            .create_table(VECTORS_TABLE, Box::new(batches))
            .execute()
            .await
            .map_err(|e| StrataError::Storage(format!("Failed to create vectors table: {e}")))
    }

    async fn table(&self) -> Result<&Table> {
        self.table
            .get_or_try_init(|| async {
                let connection = Self::connect(self.scratch.path()).await?;
                let empty = Self::to_batch(self.dimension, &[], &[])?;
                Self::create_table(&connection, self.dimension, empty).await
            })
            .await
    }

    async fn read_all(table: &Table) -> Result<Vec<RecordBatch>> {
        let stream = table
            .query()
            .execute()
            .await
            .map_err(|e| StrataError::Storage(format!("Failed to scan vectors: {e}")))?;

        stream
            .try_collect()
            .await
            .map_err(|e| StrataError::Storage(format!("Failed to collect vectors: {e}")))
    }

    fn id_column(batch: &RecordBatch) -> Result<&StringArray> {
        batch
            .column_by_name("id")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| StrataError::Storage("Failed to get id column".to_string()))
    }

    /// Decode rows into (id, vector) pairs, checking the stored width
    fn decode_rows(&self, batches: &[RecordBatch]) -> Result<(Vec<RecordId>, Vec<Embedding>)> {
        let mut ids = Vec::new();
        let mut vectors = Vec::new();

        for batch in batches {
            let id_array = Self::id_column(batch)?;
            let vector_array = batch
                .column_by_name("vector")
                .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
                .ok_or_else(|| StrataError::Storage("Failed to get vector column".to_string()))?;

            let width = vector_array.value_length() as usize;
            if width != self.dimension {
                return Err(StrataError::DimensionMismatch {
                    expected: self.dimension,
                    actual: width,
                });
            }

            for row in 0..batch.num_rows() {
                let list = vector_array.value(row);
                let values = list
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| StrataError::Storage("Failed to get vector values".to_string()))?;

                ids.push(id_array.value(row).to_string());
                vectors.push((0..values.len()).map(|i| values.value(i)).collect());
            }
        }

        Ok((ids, vectors))
    }

    fn id_predicate(ids: &[RecordId]) -> String {
        let quoted: Vec<String> = ids
            .iter()
            .map(|id| format!("'{}'", id.replace('\'', "''")))
            .collect();
        format!("id IN ({})", quoted.join(", "))
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn ids(&self) -> Vec<RecordId> {
        self.ids.iter().cloned().collect()
    }

    async fn add(&mut self, ids: &[RecordId], vectors: &[Embedding]) -> Result<()> {
        validate_batch(self.dimension, ids, vectors)?;
        if ids.is_empty() {
            return Ok(());
        }

        let batch = Self::to_batch(self.dimension, ids, vectors)?;
        let table = self.table().await?;

        let existing: Vec<RecordId> = ids
            .iter()
            .filter(|id| self.ids.contains(*id))
            .cloned()
            .collect();
        if !existing.is_empty() {
            table
                .delete(&Self::id_predicate(&existing))
                .await
                .map_err(|e| StrataError::Storage(format!("Failed to replace vectors: {e}")))?;
        }

        let schema = Self::schema(self.dimension);
        table
            .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .execute()
            .await
            .map_err(|e| StrataError::Storage(format!("Failed to add vectors: {e}")))?;

        self.ids.extend(ids.iter().cloned());
        Ok(())
    }

    async fn delete(&mut self, ids: &[RecordId]) -> Result<bool> {
        let present: Vec<RecordId> = ids
            .iter()
            .filter(|id| self.ids.contains(*id))
            .cloned()
            .collect();
        let all_found = present.len() == ids.len();

        if !present.is_empty() {
            self.table()
                .await?
                .delete(&Self::id_predicate(&present))
                .await
                .map_err(|e| StrataError::Storage(format!("Failed to delete vectors: {e}")))?;

            for id in &present {
                self.ids.remove(id);
            }
        }

        Ok(all_found)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(StrataError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let stream = self
            .table()
            .await?
            .query()
            .nearest_to(query)
            .map_err(|e| StrataError::IndexSearchFailure(format!("Failed to create vector query: {e}")))?
            .limit(k)
            .execute()
            .await
            .map_err(|e| StrataError::IndexSearchFailure(format!("Failed to execute search: {e}")))?;

        let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(|e| {
            StrataError::IndexSearchFailure(format!("Failed to collect search results: {e}"))
        })?;

        let mut hits = Vec::new();
        for batch in &batches {
            let id_array = Self::id_column(batch)?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| {
                    StrataError::IndexSearchFailure("Missing _distance column".to_string())
                })?;

            for row in 0..batch.num_rows() {
                hits.push(ScoredId {
                    id: id_array.value(row).to_string(),
                    score: distances.value(row),
                });
            }
        }

        hits.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn save(&self, path: &Path) -> Result<()> {
        let batches = Self::read_all(self.table().await?).await?;
        let (ids, vectors) = self.decode_rows(&batches)?;

        std::fs::create_dir_all(path)?;
        let target = path.join(SNAPSHOT_DIR);
        let staging = storage::begin_staging(&target)?;

        let connection = Self::connect(&staging).await?;
        let batch = Self::to_batch(self.dimension, &ids, &vectors)?;
        Self::create_table(&connection, self.dimension, batch).await?;

        storage::commit_staging(&staging, &target)?;

        tracing::debug!("Saved {} vectors to {}", ids.len(), target.display());
        Ok(())
    }

    async fn load(&mut self, path: &Path) -> Result<()> {
        let source = storage::committed_dir(&path.join(SNAPSHOT_DIR));
        if !source.exists() {
            return Err(StrataError::Storage(format!(
                "No Lance snapshot at {}",
                source.display()
            )));
        }

        let connection = Self::connect(&source).await?;
        let saved = connection
            .open_table(VECTORS_TABLE)
            .execute()
            .await
            .map_err(|e| StrataError::Storage(format!("Failed to open vectors table: {e}")))?;

        let batches = Self::read_all(&saved).await?;
        let (ids, vectors) = self.decode_rows(&batches)?;

        let table = self.table().await?;
        table
            .delete("true")
            .await
            .map_err(|e| StrataError::Storage(format!("Failed to clear vectors: {e}")))?;

        if !ids.is_empty() {
            let batch = Self::to_batch(self.dimension, &ids, &vectors)?;
            let schema = Self::schema(self.dimension);
            table
                .add(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
                .execute()
                .await
                .map_err(|e| StrataError::Storage(format!("Failed to restore vectors: {e}")))?;
        }

        self.ids = ids.into_iter().collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<RecordId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    async fn abc_index() -> LanceIndex {
        let mut index = LanceIndex::new(3).unwrap();
        index
            .add(
                &ids(&["a", "b", "c"]),
                &[
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.9, 0.1, 0.0],
                ],
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_search_best_first() {
        let index = abc_index().await;
        let hits = index.search(&[1.0, 0.0, 0.0], 2).await.unwrap();

        let hit_ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(hit_ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_empty_search() {
        let index = LanceIndex::new(3).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_and_delete() {
        let mut index = abc_index().await;
        index
            .add(&ids(&["b"]), &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();
        assert_eq!(index.len(), 3);

        assert!(index.delete(&ids(&["a"])).await.unwrap());
        assert!(!index.delete(&ids(&["a"])).await.unwrap());
        assert_eq!(index.ids(), ids(&["b", "c"]));
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let index = abc_index().await;
        index.save(dir.path()).await.unwrap();

        let mut restored = LanceIndex::new(3).unwrap();
        restored.load(dir.path()).await.unwrap();
        assert_eq!(restored.ids(), index.ids());

        let hits = restored.search(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_load_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        abc_index().await.save(dir.path()).await.unwrap();

        let mut wrong = LanceIndex::new(4).unwrap();
        let result = wrong.load(dir.path()).await;
        assert!(matches!(result, Err(StrataError::DimensionMismatch { .. })));
        assert!(wrong.is_empty());
    }
}
