//! MemoryBackend: a StorageBackend that holds all data in process memory.
//!
//! Used for tests and for ephemeral stores. An optional record quota makes
//! writes fail the way a full device store would.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, StorageError};
use crate::index::scan::order_index_scan;
use crate::index::types::KeyRange;
use crate::schema::registry::IndexDef;
use crate::types::{RecordKey, StoredRecord};

use super::traits::StorageBackend;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// table name → (key → record data)
    tables: HashMap<String, BTreeMap<RecordKey, Value>>,
    meta: HashMap<String, String>,
}

impl MemoryState {
    fn record_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }
}

/// In-memory storage backend.
///
/// Interior mutability via `parking_lot::Mutex`. The lock is never held while
/// a transaction closure runs; transactions snapshot the whole state and
/// restore it if the closure fails.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that refuses to hold more than `max_records` records.
    pub fn with_quota(max_records: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            quota: Some(max_records),
        }
    }

    fn to_record(table: &str, key: RecordKey, data: &Value) -> StoredRecord {
        StoredRecord {
            table: table.to_string(),
            key,
            data: data.clone(),
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn get_raw(&self, table: &str, key: RecordKey) -> Result<Option<StoredRecord>> {
        let state = self.state.lock();
        Ok(state
            .tables
            .get(table)
            .and_then(|t| t.get(&key))
            .map(|data| Self::to_record(table, key, data)))
    }

    fn put_raw(&self, record: &StoredRecord) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(quota) = self.quota {
            let exists = state
                .tables
                .get(&record.table)
                .is_some_and(|t| t.contains_key(&record.key));
            if !exists && state.record_count() >= quota {
                return Err(StorageError::Write {
                    table: record.table.clone(),
                    message: format!("quota of {quota} records exceeded"),
                    source: None,
                }
                .into());
            }
        }
        state
            .tables
            .entry(record.table.clone())
            .or_default()
            .insert(record.key, record.data.clone());
        Ok(())
    }

    fn delete_raw(&self, table: &str, key: RecordKey) -> Result<bool> {
        let mut state = self.state.lock();
        Ok(state
            .tables
            .get_mut(table)
            .is_some_and(|t| t.remove(&key).is_some()))
    }

    fn scan_raw(&self, table: &str, reverse: bool) -> Result<Vec<StoredRecord>> {
        let state = self.state.lock();
        let Some(records) = state.tables.get(table) else {
            return Ok(Vec::new());
        };
        let iter = records.iter().map(|(k, v)| Self::to_record(table, *k, v));
        Ok(if reverse { iter.rev().collect() } else { iter.collect() })
    }

    fn scan_index_raw(
        &self,
        table: &str,
        index: &IndexDef,
        range: Option<&KeyRange>,
        reverse: bool,
    ) -> Result<Option<Vec<StoredRecord>>> {
        let records = self.scan_raw(table, false)?;
        Ok(Some(order_index_scan(records, index, range, reverse)))
    }

    fn count_raw(&self, table: &str) -> Result<usize> {
        Ok(self.state.lock().tables.get(table).map_or(0, BTreeMap::len))
    }

    fn clear_raw(&self, table: &str) -> Result<usize> {
        Ok(self
            .state
            .lock()
            .tables
            .remove(table)
            .map_or(0, |t| t.len()))
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().meta.get(key).cloned())
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .meta
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    // Index keys are evaluated at scan time.
    fn create_index(&self, _table: &str, _index: &IndexDef) -> Result<()> {
        Ok(())
    }

    fn drop_index(&self, _table: &str, _index: &IndexDef) -> Result<()> {
        Ok(())
    }

    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let snapshot = self.state.lock().clone();
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                *self.state.lock() = snapshot;
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
