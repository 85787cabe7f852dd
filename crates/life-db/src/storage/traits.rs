/// Storage backend trait for life-db.
///
/// `StorageBackend` is the narrow raw I/O trait implemented by concrete
/// backends (in-memory, SQLite). Table semantics such as key assignment,
/// schema upgrades and merge-on-update live in [`Store`](super::store::Store).
use crate::error::Result;
use crate::index::types::KeyRange;
use crate::schema::registry::IndexDef;
use crate::types::{RecordKey, StoredRecord};

/// Low-level storage backend: raw record I/O with no table semantics.
///
/// Implementors must be `Send + Sync` so they can be shared across threads.
pub trait StorageBackend: Send + Sync {
    /// Fetch a single raw record by table and key.
    fn get_raw(&self, table: &str, key: RecordKey) -> Result<Option<StoredRecord>>;

    /// Persist (insert or replace) a raw record.
    fn put_raw(&self, record: &StoredRecord) -> Result<()>;

    /// Remove a record. Returns whether it existed.
    fn delete_raw(&self, table: &str, key: RecordKey) -> Result<bool>;

    /// All records of a table in primary-key order.
    fn scan_raw(&self, table: &str, reverse: bool) -> Result<Vec<StoredRecord>>;

    /// Records whose value at `index.key_path` is indexable and inside
    /// `range`, ordered by index key then primary key.
    ///
    /// Returns `None` if the backend cannot execute this scan; the caller then
    /// falls back to a full scan.
    fn scan_index_raw(
        &self,
        table: &str,
        index: &IndexDef,
        range: Option<&KeyRange>,
        reverse: bool,
    ) -> Result<Option<Vec<StoredRecord>>>;

    /// Count records in a table.
    fn count_raw(&self, table: &str) -> Result<usize>;

    /// Remove every record of a table. Returns the number removed.
    fn clear_raw(&self, table: &str) -> Result<usize>;

    /// Read a metadata key-value pair (used for key counters, schema versions, etc.).
    fn get_meta(&self, key: &str) -> Result<Option<String>>;

    /// Write a metadata key-value pair.
    fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    /// Build a secondary index. Backends without physical indexes may no-op.
    fn create_index(&self, table: &str, index: &IndexDef) -> Result<()>;

    fn drop_index(&self, table: &str, index: &IndexDef) -> Result<()>;

    /// Execute a closure inside a backend transaction.
    ///
    /// The closure receives a reference to `self`; implementations must
    /// begin a transaction before calling `f` and commit (or roll back on
    /// error) after it returns.
    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}
