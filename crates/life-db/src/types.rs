use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::types::KeyRange;

/// Primary key of a stored record. Assigned by the store, never reused.
pub type RecordKey = i64;

/// Record as kept in the persistence layer.
/// `data` always carries the key again as its `id` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub table: String,
    pub key: RecordKey,
    pub data: Value,
}

/// Options for an ordered scan over one table.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// Index to scan by. `None` scans in primary-key order.
    pub index: Option<String>,
    /// Key range over `index`; requires an index.
    pub range: Option<KeyRange>,
    /// Descending instead of ascending.
    pub reverse: bool,
}

impl ScanRequest {
    /// Every record of the table in primary-key order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every record that has a value for `index`, in index order.
    pub fn by_index(index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::default()
        }
    }

    pub fn range(index: impl Into<String>, range: KeyRange) -> Self {
        Self {
            index: Some(index.into()),
            range: Some(range),
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }
}
