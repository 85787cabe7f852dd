//! ChangeEvent: represents a committed mutation to the store.
//!
//! Emitted by `LiveStore` after each write so that subscribers know which
//! table/record changed.

use crate::types::RecordKey;

/// A change event emitted by the live store after any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A record was inserted with a fresh key.
    Added { table: String, key: RecordKey },
    /// An existing record was merged with new fields.
    Updated { table: String, key: RecordKey },
    /// A record was removed.
    Removed { table: String, key: RecordKey },
    /// Every record of a table was removed.
    Cleared { table: String },
}

impl ChangeEvent {
    /// The table that was affected.
    pub fn table(&self) -> &str {
        match self {
            Self::Added { table, .. }
            | Self::Updated { table, .. }
            | Self::Removed { table, .. }
            | Self::Cleared { table } => table,
        }
    }

    /// Key of the affected record, `None` when the whole table changed.
    pub fn key(&self) -> Option<RecordKey> {
        match self {
            Self::Added { key, .. } | Self::Updated { key, .. } | Self::Removed { key, .. } => {
                Some(*key)
            }
            Self::Cleared { .. } => None,
        }
    }
}
