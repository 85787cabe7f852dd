//! Store<B>: orchestration layer over any `StorageBackend`.
//!
//! The store owns key assignment, schema upgrades, merge-on-update and index
//! resolution. All raw I/O is delegated to the backend.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::{BoxError, LifeDbError, MigrationError, QueryError, Result, SchemaError, StorageError},
    index::scan::order_index_scan,
    schema::{
        migrate::{plan_upgrade, UpgradePlan},
        registry::{SchemaRegistry, SchemaVersion, TableDef},
    },
    types::{RecordKey, ScanRequest, StoredRecord},
};

use super::traits::StorageBackend;

// ============================================================================
// Metadata Keys
// ============================================================================

const META_SCHEMA_VERSION: &str = "schema:version";

/// Persisted table layout (JSON array of `TableDef`).
const META_SCHEMA_TABLES: &str = "schema:tables";

/// Prefix for per-table key counters (formatted as `"next_key:{table}"`).
const META_NEXT_KEY_PREFIX: &str = "next_key:";

// ============================================================================
// Store Struct
// ============================================================================

/// An open store: a backend plus the schema version it was upgraded to.
pub struct Store<B: StorageBackend> {
    backend: B,
    schema: SchemaVersion,
    closed: AtomicBool,
}

impl<B: StorageBackend> Store<B> {
    /// Open a store over `backend`, upgrading its persisted schema to the
    /// registry's current version.
    ///
    /// Fails with `SchemaError::NoVersions` for an empty registry and with
    /// `MigrationError` if any migration step fails; a failed upgrade leaves
    /// the persisted data untouched.
    pub fn open(backend: B, registry: &SchemaRegistry) -> Result<Self> {
        let current = registry.current()?.clone();

        let stored_version = backend
            .get_meta(META_SCHEMA_VERSION)?
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| SchemaError::CorruptMetadata(format!("schema version {s:?}")))
            })
            .transpose()?;
        let stored_tables: Vec<TableDef> = match backend.get_meta(META_SCHEMA_TABLES)? {
            Some(s) => serde_json::from_str(&s)
                .map_err(|e| SchemaError::CorruptMetadata(format!("table layout: {e}")))?,
            None => Vec::new(),
        };

        let plan = plan_upgrade(registry, stored_version, &stored_tables)?;
        if plan.is_noop() {
            debug!(version = plan.to, "schema up to date");
        } else {
            debug!(?plan, "upgrading schema");
            backend.transaction(|b| apply_upgrade(b, &plan))?;
        }

        Ok(Self {
            backend,
            schema: current,
            closed: AtomicBool::new(false),
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed.into());
        }
        Ok(())
    }

    fn table_def(&self, table: &str) -> Result<&TableDef> {
        self.check_open()?;
        self.schema
            .table(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()).into())
    }

    /// Take the next key of `table` from its persisted counter.
    fn next_key(&self, table: &str) -> Result<RecordKey> {
        let meta_key = format!("{META_NEXT_KEY_PREFIX}{table}");
        let next = match self.backend.get_meta(&meta_key)? {
            Some(s) => s.parse::<RecordKey>().map_err(|_| {
                LifeDbError::Internal(format!("Invalid key counter stored for {table}: {s:?}"))
            })?,
            None => 1,
        };
        self.backend.set_meta(&meta_key, &(next + 1).to_string())?;
        Ok(next)
    }

    fn into_object(table: &str, value: Value) -> Result<Map<String, Value>> {
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::NotAnObject {
                table: table.to_string(),
            }
            .into()),
        }
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Insert `record`, assigning it a fresh key that is also written into
    /// its `id` field. Keys are never reused, even after removal.
    pub fn add(&self, table: &str, record: Value) -> Result<RecordKey> {
        self.table_def(table)?;
        let mut data = Self::into_object(table, record)?;

        self.backend.transaction(|backend| {
            let key = self.next_key(table)?;
            data.insert("id".to_string(), Value::from(key));
            backend.put_raw(&StoredRecord {
                table: table.to_string(),
                key,
                data: Value::Object(data),
            })?;
            Ok(key)
        })
    }

    /// Fetch one record. Absence is not an error.
    pub fn get(&self, table: &str, key: RecordKey) -> Result<Option<Value>> {
        self.table_def(table)?;
        Ok(self.backend.get_raw(table, key)?.map(|r| r.data))
    }

    /// Shallow-merge the fields of `partial` into the stored record and return
    /// the merged record. Fields absent from `partial` are kept.
    ///
    /// Fails with `NotFound` if the key is absent and with `ImmutableField` if
    /// `partial` tries to change `id`; in both cases nothing is written.
    pub fn update(&self, table: &str, key: RecordKey, partial: Value) -> Result<Value> {
        self.table_def(table)?;
        let patch = Self::into_object(table, partial)?;

        if let Some(id) = patch.get("id") {
            if id.as_i64() != Some(key) {
                return Err(StorageError::ImmutableField {
                    table: table.to_string(),
                    key,
                    field: "id".to_string(),
                }
                .into());
            }
        }

        let existing = self
            .backend
            .get_raw(table, key)?
            .ok_or_else(|| StorageError::NotFound {
                table: table.to_string(),
                key,
            })?;
        let mut merged = Self::into_object(table, existing.data)?;
        merged.extend(patch);
        let merged = Value::Object(merged);

        self.backend.put_raw(&StoredRecord {
            table: table.to_string(),
            key,
            data: merged.clone(),
        })?;
        Ok(merged)
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove(&self, table: &str, key: RecordKey) -> Result<bool> {
        self.table_def(table)?;
        self.backend.delete_raw(table, key)
    }

    /// Ordered scan over one table.
    ///
    /// With an index, records are ordered by index key then primary key and
    /// records without an indexable value at the index path are skipped.
    pub fn scan(&self, table: &str, request: &ScanRequest) -> Result<Vec<StoredRecord>> {
        let def = self.table_def(table)?;

        let Some(index_name) = &request.index else {
            if request.range.is_some() {
                return Err(QueryError::RangeWithoutIndex {
                    table: table.to_string(),
                }
                .into());
            }
            return self.backend.scan_raw(table, request.reverse);
        };

        let index = def
            .find_index(index_name)
            .ok_or_else(|| QueryError::UnknownIndex {
                table: table.to_string(),
                index: index_name.clone(),
            })?;
        if let Some(range) = &request.range {
            range.validate(index_name)?;
        }

        let native =
            self.backend
                .scan_index_raw(table, index, request.range.as_ref(), request.reverse)?;
        match native {
            Some(records) => Ok(records),
            None => {
                let all = self.backend.scan_raw(table, false)?;
                Ok(order_index_scan(
                    all,
                    index,
                    request.range.as_ref(),
                    request.reverse,
                ))
            }
        }
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        self.table_def(table)?;
        self.backend.count_raw(table)
    }

    /// Remove every record of `table`. Key counters are kept.
    pub fn clear(&self, table: &str) -> Result<usize> {
        self.table_def(table)?;
        self.backend.clear_raw(table)
    }

    /// Run `f` atomically: if it fails, none of its writes persist.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.check_open()?;
        self.backend.transaction(|_| f(self))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// The schema version the store was opened at.
    pub fn schema(&self) -> &SchemaVersion {
        &self.schema
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.schema.tables.iter().map(|t| t.name.as_str())
    }

    /// Mark the store closed. Every later operation fails with
    /// `StorageError::Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ============================================================================
// Upgrade
// ============================================================================

fn apply_upgrade<B: StorageBackend>(backend: &B, plan: &UpgradePlan) -> Result<()> {
    for (table, index) in &plan.drop_indexes {
        backend.drop_index(table, index)?;
    }
    for table in &plan.dropped_tables {
        let removed = backend.clear_raw(table)?;
        debug!(table = %table, removed, "cleared dropped table");
    }

    for (version, migrate) in &plan.migrations {
        for table in &plan.tables {
            for record in backend.scan_raw(&table.name, false)? {
                let key = record.key;
                let fail = |source: BoxError| MigrationError {
                    table: table.name.clone(),
                    key,
                    to_version: *version,
                    source,
                };
                let migrated = migrate(&table.name, record.data).map_err(fail)?;
                let Value::Object(mut data) = migrated else {
                    return Err(fail("migration must return an object".into()).into());
                };
                data.insert("id".to_string(), Value::from(key));
                backend.put_raw(&StoredRecord {
                    table: table.name.clone(),
                    key,
                    data: Value::Object(data),
                })?;
            }
        }
        debug!(version, "applied migration");
    }

    for (table, index) in &plan.create_indexes {
        backend.create_index(table, index)?;
    }

    backend.set_meta(META_SCHEMA_VERSION, &plan.to.to_string())?;
    backend.set_meta(META_SCHEMA_TABLES, &serde_json::to_string(&plan.tables)?)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
