//! SQLite storage backend for life-db.
//!
//! Implements `StorageBackend` using rusqlite (bundled). The connection is
//! protected by a `parking_lot::ReentrantMutex<RefCell<Connection>>` so that
//! `transaction()` can hold the lock while calling the closure, which also
//! needs to lock in order to execute SQL.
//!
//! All tables share one `records(tbl, key, data)` table; declared indexes are
//! expression indexes on `json_extract(data, '$.<key_path>')`.

use std::cell::{Cell, RefCell};
use std::path::Path;

use parking_lot::ReentrantMutex;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::error::{LifeDbError, Result, StorageError};
use crate::index::scan::order_index_scan;
use crate::index::types::{IndexKey, KeyRange};
use crate::schema::registry::IndexDef;
use crate::types::{RecordKey, StoredRecord};

use super::traits::StorageBackend;

// ============================================================================
// Value helpers
// ============================================================================

/// Convert an `IndexKey` to a `rusqlite::types::Value`.
///
/// `json_extract` yields 1/0 for JSON booleans, so bools bind as integers.
fn index_key_to_sql(k: &IndexKey) -> rusqlite::types::Value {
    match k {
        IndexKey::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        IndexKey::Number(n) => rusqlite::types::Value::Real(*n),
        IndexKey::String(s) => rusqlite::types::Value::Text(s.clone()),
    }
}

/// Map a rusqlite error to a `LifeDbError`.
fn storage_err(e: rusqlite::Error) -> LifeDbError {
    LifeDbError::Storage(StorageError::Sqlite(e))
}

fn write_err(table: &str, e: rusqlite::Error) -> LifeDbError {
    LifeDbError::Storage(StorageError::Write {
        table: table.to_string(),
        message: e.to_string(),
        source: Some(Box::new(e)),
    })
}

/// Quoted SQL name of a table index. The table name's length is part of
/// the name so `a_b`/`c` and `a`/`b_c` stay distinct.
fn index_sql_name(table: &str, index: &IndexDef) -> String {
    format!("\"idx_{}_{}_{}\"", table.len(), table, index.name)
}

fn json_path_expr(index: &IndexDef) -> String {
    // key paths are validated by the schema registry, safe to inline
    format!("json_extract(data, '$.{}')", index.key_path)
}

// ============================================================================
// SqliteBackend
// ============================================================================

/// SQLite storage backend.
///
/// `ReentrantMutex` allows `transaction()` to hold the guard while the closure
/// re-acquires it for individual SQL operations.
pub struct SqliteBackend {
    conn: ReentrantMutex<RefCell<rusqlite::Connection>>,
}

impl SqliteBackend {
    /// Open (or create) a file-backed SQLite database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path).map_err(storage_err)?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::with_connection(conn)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(storage_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )
        .map_err(storage_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                tbl   TEXT    NOT NULL,
                key   INTEGER NOT NULL,
                data  TEXT    NOT NULL DEFAULT '{}',
                PRIMARY KEY (tbl, key)
            );
            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(storage_err)?;

        Ok(Self {
            conn: ReentrantMutex::new(RefCell::new(conn)),
        })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Execute `f` with a shared reference to the underlying connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>,
    {
        let guard = self.conn.lock();
        let conn = guard.borrow();
        f(&conn).map_err(storage_err)
    }

    /// Decode `(key, data)` rows of one table.
    fn decode_rows(table: &str, rows: Vec<(RecordKey, String)>) -> Result<Vec<StoredRecord>> {
        rows.into_iter()
            .map(|(key, text)| Self::decode_row(table, key, &text))
            .collect()
    }

    fn decode_row(table: &str, key: RecordKey, text: &str) -> Result<StoredRecord> {
        let data = serde_json::from_str(text).map_err(|e| StorageError::Corruption {
            table: table.to_string(),
            key,
            message: e.to_string(),
        })?;
        Ok(StoredRecord {
            table: table.to_string(),
            key,
            data,
        })
    }

    /// SQL narrowing for an index scan. The result is a superset of the exact
    /// answer; exact bound and kind semantics are applied afterwards.
    fn build_index_scan_sql(
        index: &IndexDef,
        range: Option<&KeyRange>,
    ) -> (String, Vec<rusqlite::types::Value>) {
        let expr = json_path_expr(index);
        let mut sql = format!(
            "SELECT key, data FROM records WHERE tbl = ?1 AND {expr} IS NOT NULL"
        );
        let mut params: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(range) = range {
            if let Some(lower) = &range.lower {
                params.push(index_key_to_sql(&lower.value));
                sql.push_str(&format!(" AND {expr} >= ?{}", params.len() + 1));
            }
            if let Some(upper) = &range.upper {
                params.push(index_key_to_sql(&upper.value));
                sql.push_str(&format!(" AND {expr} <= ?{}", params.len() + 1));
            }
        }

        sql.push_str(&format!(" ORDER BY {expr}, key"));
        (sql, params)
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

impl StorageBackend for SqliteBackend {
    fn get_raw(&self, table: &str, key: RecordKey) -> Result<Option<StoredRecord>> {
        let text: Option<String> = self.with_conn(|conn| {
            conn.prepare_cached("SELECT data FROM records WHERE tbl = ?1 AND key = ?2")?
                .query_row(params![table, key], |row| row.get(0))
                .optional()
        })?;
        text.map(|t| Self::decode_row(table, key, &t)).transpose()
    }

    fn put_raw(&self, record: &StoredRecord) -> Result<()> {
        let data = serde_json::to_string(&record.data)?;
        let guard = self.conn.lock();
        let conn = guard.borrow();
        conn.prepare_cached(
            "INSERT INTO records (tbl, key, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(tbl, key) DO UPDATE SET data = excluded.data",
        )
        .and_then(|mut stmt| stmt.execute(params![record.table, record.key, data]))
        .map_err(|e| write_err(&record.table, e))?;
        Ok(())
    }

    fn delete_raw(&self, table: &str, key: RecordKey) -> Result<bool> {
        let guard = self.conn.lock();
        let conn = guard.borrow();
        let n = conn
            .prepare_cached("DELETE FROM records WHERE tbl = ?1 AND key = ?2")
            .and_then(|mut stmt| stmt.execute(params![table, key]))
            .map_err(|e| write_err(table, e))?;
        Ok(n > 0)
    }

    fn scan_raw(&self, table: &str, reverse: bool) -> Result<Vec<StoredRecord>> {
        let sql = if reverse {
            "SELECT key, data FROM records WHERE tbl = ?1 ORDER BY key DESC"
        } else {
            "SELECT key, data FROM records WHERE tbl = ?1 ORDER BY key ASC"
        };
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params![table], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<Vec<(RecordKey, String)>>>()
        })?;
        Self::decode_rows(table, rows)
    }

    fn scan_index_raw(
        &self,
        table: &str,
        index: &IndexDef,
        range: Option<&KeyRange>,
        reverse: bool,
    ) -> Result<Option<Vec<StoredRecord>>> {
        let (sql, extra) = Self::build_index_scan_sql(index, range);
        let mut params: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::Text(table.to_string())];
        params.extend(extra);

        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<(RecordKey, String)>>>()
        })?;
        let records = Self::decode_rows(table, rows)?;
        Ok(Some(order_index_scan(records, index, range, reverse)))
    }

    fn count_raw(&self, table: &str) -> Result<usize> {
        let n: i64 = self.with_conn(|conn| {
            conn.prepare_cached("SELECT COUNT(*) FROM records WHERE tbl = ?1")?
                .query_row(params![table], |row| row.get(0))
        })?;
        Ok(n as usize)
    }

    fn clear_raw(&self, table: &str) -> Result<usize> {
        let guard = self.conn.lock();
        let conn = guard.borrow();
        conn.execute("DELETE FROM records WHERE tbl = ?1", params![table])
            .map_err(|e| write_err(table, e))
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.prepare_cached("SELECT value FROM meta WHERE key = ?1")?
                .query_row(params![key], |row| row.get(0))
                .optional()
        })
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?
            .execute(params![key, value])
        })?;
        Ok(())
    }

    fn create_index(&self, table: &str, index: &IndexDef) -> Result<()> {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON records (tbl, {})",
            index_sql_name(table, index),
            json_path_expr(index)
        );
        debug!(table, index = %index.name, "creating sqlite index");
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn drop_index(&self, table: &str, index: &IndexDef) -> Result<()> {
        let sql = format!("DROP INDEX IF EXISTS {}", index_sql_name(table, index));
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        // SAVEPOINTs compose with outer transactions; each invocation gets a
        // unique name so nesting never collides.
        thread_local! {
            static SP_COUNTER: Cell<u64> = const { Cell::new(0) };
        }
        let sp_name = SP_COUNTER.with(|c| {
            let n = c.get();
            c.set(n + 1);
            format!("sp_{n}")
        });

        // Held for the whole transaction so other threads cannot interleave
        // statements inside the savepoint.
        let guard = self.conn.lock();
        guard
            .borrow()
            .execute_batch(&format!("SAVEPOINT {sp_name}"))
            .map_err(|e| {
                LifeDbError::Storage(StorageError::Transaction {
                    message: format!("could not open savepoint {sp_name}"),
                    source: Some(Box::new(e)),
                })
            })?;

        let rollback = |guard: &RefCell<rusqlite::Connection>| {
            let _ = guard.borrow().execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {sp_name}; RELEASE SAVEPOINT {sp_name};"
            ));
        };

        match f(self) {
            Ok(v) => {
                let released = guard
                    .borrow()
                    .execute_batch(&format!("RELEASE SAVEPOINT {sp_name}"));
                match released {
                    Ok(()) => Ok(v),
                    Err(e) => {
                        rollback(&*guard);
                        Err(LifeDbError::Storage(StorageError::Transaction {
                            message: format!("could not release savepoint {sp_name}"),
                            source: Some(Box::new(e)),
                        }))
                    }
                }
            }
            Err(e) => {
                rollback(&*guard);
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
