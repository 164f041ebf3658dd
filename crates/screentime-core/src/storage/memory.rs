//! In-process state store.

use std::cell::Cell;
use std::collections::HashMap;

use super::state::StateStore;
use crate::error::StorageError;

/// A `HashMap`-backed [`StateStore`].
///
/// Reads and writes can be made to fail on demand so callers can exercise
/// the storage-failure paths without a real disk. An exclusive section keeps
/// a checkpoint that `rollback` restores.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    spent_secs: u64,
    checkpoint: Option<(HashMap<String, String>, u64)>,
    fail_reads: bool,
    fail_writes: bool,
    writes: u64,
    reads: Cell<u64>,
    rollbacks: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    /// Insert a raw value, bypassing failure injection.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful `write_all` calls.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Number of `read` calls, failed ones included.
    pub fn read_count(&self) -> u64 {
        self.reads.get()
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks
    }

    pub fn in_exclusive(&self) -> bool {
        self.checkpoint.is_some()
    }

    /// Drained seconds reported through `record_spent`.
    pub fn spent_secs(&self) -> u64 {
        self.spent_secs
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.reads.set(self.reads.get() + 1);
        if self.fail_reads {
            return Err(StorageError::Unavailable("memory store reads disabled".into()));
        }
        Ok(self.entries.get(key).cloned())
    }

    fn write_all(&mut self, entries: &[(String, String)]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable("memory store writes disabled".into()));
        }
        for (key, value) in entries {
            self.entries.insert(key.clone(), value.clone());
        }
        self.writes += 1;
        Ok(())
    }

    fn begin_exclusive(&mut self) -> Result<(), StorageError> {
        if self.checkpoint.is_some() {
            return Err(StorageError::Unavailable("exclusive section already open".into()));
        }
        self.checkpoint = Some((self.entries.clone(), self.spent_secs));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.checkpoint = None;
        Ok(())
    }

    fn rollback(&mut self) {
        if let Some((entries, spent_secs)) = self.checkpoint.take() {
            self.entries = entries;
            self.spent_secs = spent_secs;
        }
        self.rollbacks += 1;
    }

    fn record_spent(&mut self, seconds: u64, _at_ms: i64) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Unavailable("memory store writes disabled".into()));
        }
        self.spent_secs = self.spent_secs.saturating_add(seconds);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_write_leaves_entries_untouched() {
        let mut store = MemoryStore::new();
        store.insert("a", "1");
        store.set_fail_writes(true);
        let err = store.write_all(&[("a".into(), "2".into()), ("b".into(), "3".into())]);
        assert!(err.is_err());
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert!(store.get("b").is_none());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn rollback_restores_checkpoint() {
        let mut store = MemoryStore::new();
        store.insert("a", "1");
        store.begin_exclusive().unwrap();
        store.write_all(&[("a".into(), "2".into())]).unwrap();
        store.record_spent(7, 0).unwrap();
        store.rollback();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.spent_secs(), 0);
        assert!(!store.in_exclusive());
    }
}
