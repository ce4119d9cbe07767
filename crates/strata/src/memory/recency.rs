//! Recency buffer for "last K observations" recall
//!
//! A fixed-capacity FIFO of raw records, independent of the vector index.
//! Insertion is at the tail, eviction from the head.

use std::collections::VecDeque;
use std::path::Path;

use crate::error::{Result, StrataError};
use crate::memory::types::Record;
use crate::storage;

pub const RECENT_FILE: &str = "recent.json";

#[derive(Debug, Clone)]
pub struct RecencyBuffer {
    entries: VecDeque<Record>,
    capacity: usize,
}

impl RecencyBuffer {
    /// Create an empty buffer; a zero capacity is rejected
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StrataError::InvalidArgument(
                "max_recent_steps must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a record, returning the evicted oldest entry when full
    pub fn push(&mut self, record: Record) -> Option<Record> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(record);
        evicted
    }

    /// The last `min(k, len)` entries, oldest first and most recent last
    pub fn recent(&self, k: usize) -> Result<Vec<Record>> {
        if k > self.capacity {
            return Err(StrataError::InvalidArgument(format!(
                "k={k} exceeds max_recent_steps={}",
                self.capacity
            )));
        }

        let skip = self.entries.len().saturating_sub(k);
        Ok(self.entries.iter().skip(skip).cloned().collect())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        storage::write_json_atomic(&dir.join(RECENT_FILE), &self.entries)
    }

    /// Replace contents with a saved buffer, keeping only the newest
    /// `capacity` entries if the file holds more
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        let saved: Vec<Record> = storage::read_json(&dir.join(RECENT_FILE))?;
        let skip = saved.len().saturating_sub(self.capacity);
        self.entries = saved.into_iter().skip(skip).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(n: u32) -> Record {
        json!({"step": n}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            RecencyBuffer::new(0),
            Err(StrataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_push_and_len() {
        let mut buffer = RecencyBuffer::new(3).unwrap();
        assert!(buffer.is_empty());

        assert!(buffer.push(record(1)).is_none());
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = RecencyBuffer::new(3).unwrap();
        for i in 0..5 {
            buffer.push(record(i));
        }

        assert_eq!(buffer.len(), 3);
        let steps: Vec<_> = buffer.iter().map(|r| r["step"].clone()).collect();
        assert_eq!(steps, vec![json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut buffer = RecencyBuffer::new(1).unwrap();
        buffer.push(record(1));
        assert_eq!(buffer.push(record(2)), Some(record(1)));
    }

    #[test]
    fn test_recent_is_tail_in_order() {
        let mut buffer = RecencyBuffer::new(2).unwrap();
        buffer.push(record(1));
        buffer.push(record(2));
        buffer.push(record(3));

        assert_eq!(buffer.recent(2).unwrap(), vec![record(2), record(3)]);
        assert_eq!(buffer.recent(1).unwrap(), vec![record(3)]);
        assert!(buffer.recent(0).unwrap().is_empty());
    }

    #[test]
    fn test_recent_shorter_than_k() {
        let mut buffer = RecencyBuffer::new(5).unwrap();
        buffer.push(record(1));
        assert_eq!(buffer.recent(4).unwrap(), vec![record(1)]);
    }

    #[test]
    fn test_recent_k_above_capacity() {
        let buffer = RecencyBuffer::new(2).unwrap();
        assert!(matches!(
            buffer.recent(3),
            Err(StrataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clear() {
        let mut buffer = RecencyBuffer::new(2).unwrap();
        buffer.push(record(1));
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_save_load_truncates_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut wide = RecencyBuffer::new(4).unwrap();
        for i in 0..4 {
            wide.push(record(i));
        }
        wide.save(dir.path()).unwrap();

        let mut narrow = RecencyBuffer::new(2).unwrap();
        narrow.load(dir.path()).unwrap();
        assert_eq!(narrow.recent(2).unwrap(), vec![record(2), record(3)]);
    }
}
