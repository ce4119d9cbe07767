//! Record store: id -> record, persisted as one JSON object per tenant

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::memory::types::{Record, RecordId};
use crate::storage;

pub const RECORDS_FILE: &str = "memory.json";

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: BTreeMap<RecordId, Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: RecordId, record: Record) {
        self.records.insert(id, record);
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Record> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.keys().cloned().collect()
    }

    /// Largest id present, which is also the newest
    pub fn last_id(&self) -> Option<&RecordId> {
        self.records.keys().next_back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&RecordId, &Record)> {
        self.records.iter()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        storage::write_json_atomic(&dir.join(RECORDS_FILE), &self.records)
    }

    /// Read a store from `dir` without touching any live instance
    pub fn read(dir: &Path) -> Result<Self> {
        let records = storage::read_json(&dir.join(RECORDS_FILE))?;
        Ok(Self { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(title: &str) -> Record {
        json!({"title": title}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = RecordStore::new();
        store.insert("2024-01-01-00:00:00".into(), record("a"));

        assert_eq!(store.len(), 1);
        assert!(store.contains("2024-01-01-00:00:00"));
        assert_eq!(store.get("2024-01-01-00:00:00"), Some(&record("a")));
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_last_id_is_max() {
        let mut store = RecordStore::new();
        store.insert("2024-01-02-00:00:00".into(), record("b"));
        store.insert("2024-01-01-00:00:00".into(), record("a"));

        assert_eq!(store.last_id().map(String::as_str), Some("2024-01-02-00:00:00"));
    }

    #[test]
    fn test_save_writes_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::new();
        store.insert("x".into(), record("a"));
        store.save(dir.path()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(RECORDS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"x": {"title": "a"}}));

        let restored = RecordStore::read(dir.path()).unwrap();
        assert_eq!(restored.ids(), vec!["x".to_string()]);
    }
}
