//! A record store and a vector index kept in lockstep
//!
//! Every id in the store has exactly one vector in the index and vice versa.
//! `add` writes the index first and the store last, so a failure at any step
//! leaves both untouched.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::error::{Result, StrataError};
use crate::index::{IndexKind, Metric, VectorIndex, build_index};
use crate::memory::store::RecordStore;
use crate::memory::types::{QueryResult, Record, RecordId, extract_embedding};
use crate::storage;

/// Second-resolution UTC timestamp used as the id base
pub const ID_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Largest same-second suffix; the next id moves on to the following second
const MAX_SEQUENCE: u32 = 999_999;

/// Time-derived ids that sort strictly after every id issued or observed
///
/// Two ids within the same second get a `#000001`, `#000002`, ... suffix
/// instead of colliding. Past `#999999` the id borrows the next second.
#[derive(Debug, Clone, Default)]
pub struct RecordIdGenerator {
    last: Option<RecordId>,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> RecordId {
        self.next_at(Utc::now())
    }

    pub fn next_at(&mut self, now: DateTime<Utc>) -> RecordId {
        let base = now.format(ID_FORMAT).to_string();

        let id = match &self.last {
            Some(last) if base.as_str() <= last.as_str() => {
                let (last_base, seq) = split_sequence(last);
                if seq < MAX_SEQUENCE {
                    format!("{last_base}#{:06}", seq + 1)
                } else {
                    next_second(last_base).unwrap_or_else(|| format!("{last}#000001"))
                }
            }
            _ => base,
        };

        self.last = Some(id.clone());
        id
    }

    /// Ensure future ids sort after `id`
    pub fn observe(&mut self, id: &str) {
        if self.last.as_deref().is_none_or(|last| id > last) {
            self.last = Some(id.to_string());
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

fn next_second(base: &str) -> Option<String> {
    let at = NaiveDateTime::parse_from_str(base, ID_FORMAT).ok()?;
    let next = at.checked_add_signed(TimeDelta::seconds(1))?;
    Some(next.format(ID_FORMAT).to_string())
}

fn split_sequence(id: &str) -> (&str, u32) {
    match id.rsplit_once('#') {
        Some((base, seq)) => match seq.parse() {
            Ok(n) => (base, n),
            Err(_) => (id, 0),
        },
        None => (id, 0),
    }
}

pub struct MemoryUnit {
    kind: IndexKind,
    metric: Metric,
    index: Box<dyn VectorIndex>,
    store: RecordStore,
    id_gen: RecordIdGenerator,
}

impl MemoryUnit {
    pub fn new(kind: IndexKind, dimension: usize, metric: Metric) -> Result<Self> {
        Ok(Self {
            kind,
            metric,
            index: build_index(kind, dimension, metric)?,
            store: RecordStore::new(),
            id_gen: RecordIdGenerator::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.store.get(id)
    }

    pub fn records(&self) -> &RecordStore {
        &self.store
    }

    /// True when the store and index hold exactly the same ids
    pub fn is_consistent(&self) -> bool {
        self.store.ids() == self.index.ids()
    }

    /// Store a copy of `record` and index the vector held in `embedding_field`
    pub async fn add(&mut self, record: &Record, embedding_field: &str) -> Result<RecordId> {
        let embedding = extract_embedding(record, embedding_field)?;
        if embedding.len() != self.dimension() {
            return Err(StrataError::DimensionMismatch {
                expected: self.dimension(),
                actual: embedding.len(),
            });
        }

        let id = self.id_gen.next_id();
        self.index.add(std::slice::from_ref(&id), &[embedding]).await?;
        self.store.insert(id.clone(), record.clone());

        Ok(id)
    }

    /// Nearest records to `embedding`, or an empty result on any failure
    pub async fn query(&self, embedding: &[f32], top_k: usize) -> QueryResult {
        match self.try_query(embedding, top_k).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Memory query failed, returning no results: {}", e);
                QueryResult::empty()
            }
        }
    }

    async fn try_query(&self, embedding: &[f32], top_k: usize) -> Result<QueryResult> {
        let hits = self.index.search(embedding, top_k).await?;

        let mut result = QueryResult::empty();
        for hit in hits {
            let record = self.store.get(&hit.id).ok_or_else(|| {
                StrataError::IndexSearchFailure(format!("id {} missing from record store", hit.id))
            })?;
            result.items.push(record.clone());
            result.scores.push(hit.score);
        }

        Ok(result)
    }

    /// Write records and vectors as one snapshot that replaces `dir` whole
    ///
    /// Both files land in a staging directory first. A save that fails or
    /// dies part way leaves the previous snapshot loadable.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        let staging = storage::begin_staging(dir)?;

        let written = match self.store.save(&staging) {
            Ok(()) => self.index.save(&staging).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                tracing::warn!("Failed to clear {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }

        storage::commit_staging(&staging, dir)
    }

    /// Restore from `dir`; on failure the current contents are kept
    pub async fn load(&mut self, dir: &Path) -> Result<()> {
        let dir = storage::committed_dir(dir);
        let dir = dir.as_path();
        let store = RecordStore::read(dir)?;
        let mut index = build_index(self.kind, self.dimension(), self.metric)?;
        index.load(dir).await?;

        if store.ids() != index.ids() {
            return Err(StrataError::Storage(format!(
                "record store ({}) and index ({}) disagree at {}",
                store.len(),
                index.len(),
                dir.display()
            )));
        }

        self.id_gen.reset();
        if let Some(last) = store.last_id() {
            self.id_gen.observe(last);
        }
        self.store = store;
        self.index = index;

        Ok(())
    }
}
