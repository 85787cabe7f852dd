//! Versioned schema registry: tables, their indexes, and the version chain.
//!
//! Each registered version carries the full table layout. A later version must
//! keep every table and index of the previous one unless it also supplies a
//! migration function, which is then responsible for reshaping records.

use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BoxError, SchemaError};

// ============================================================================
// Regex
// ============================================================================

static NAME_REGEX: OnceLock<regex::Regex> = OnceLock::new();
static KEY_PATH_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn name_regex() -> &'static regex::Regex {
    NAME_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("name regex is valid")
    })
}

fn key_path_regex() -> &'static regex::Regex {
    KEY_PATH_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
            .expect("key path regex is valid")
    })
}

// ============================================================================
// Table Definitions
// ============================================================================

/// A secondary index over one (possibly nested) field of a table's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    /// Dot-separated path into the record, e.g. `"createdAt"` or `"meta.kind"`.
    pub key_path: String,
}

/// A table and its indexes for one schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Index a top-level field under its own name.
    pub fn index(self, field: &str) -> Self {
        self.index_named(field, field)
    }

    pub fn index_named(mut self, name: &str, key_path: &str) -> Self {
        self.indexes.push(IndexDef {
            name: name.to_string(),
            key_path: key_path.to_string(),
        });
        self
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if !name_regex().is_match(&self.name) {
            return Err(SchemaError::InvalidName {
                kind: "table",
                name: self.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for index in &self.indexes {
            if !name_regex().is_match(&index.name) {
                return Err(SchemaError::InvalidName {
                    kind: "index",
                    name: index.name.clone(),
                });
            }
            if !key_path_regex().is_match(&index.key_path) {
                return Err(SchemaError::InvalidName {
                    kind: "key path",
                    name: index.key_path.clone(),
                });
            }
            if !seen.insert(index.name.as_str()) {
                return Err(SchemaError::DuplicateIndex {
                    table: self.name.clone(),
                    index: index.name.clone(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Versions
// ============================================================================

/// Per-record migration: receives the table name and the stored record,
/// returns the reshaped record.
pub type MigrateFn = dyn Fn(&str, Value) -> std::result::Result<Value, BoxError> + Send + Sync;

/// A single version in the version chain.
#[derive(Clone)]
pub struct SchemaVersion {
    pub version: u32,
    pub tables: Vec<TableDef>,
    pub migrate: Option<Arc<MigrateFn>>,
}

impl SchemaVersion {
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl std::fmt::Debug for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaVersion")
            .field("version", &self.version)
            .field("tables", &self.tables)
            .field("migrate", &self.migrate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered chain of schema versions. Built once at startup and handed to
/// [`Store::open`](crate::storage::store::Store::open).
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    versions: Vec<SchemaVersion>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a purely additive version.
    pub fn register(self, version: u32, tables: Vec<TableDef>) -> Result<Self, SchemaError> {
        self.push(version, tables, None)
    }

    /// Register a version whose records must be reshaped by `migrate`. Such a
    /// version may also drop tables or indexes of the previous one.
    pub fn register_with_migration<F>(
        self,
        version: u32,
        tables: Vec<TableDef>,
        migrate: F,
    ) -> Result<Self, SchemaError>
    where
        F: Fn(&str, Value) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.push(version, tables, Some(Arc::new(migrate)))
    }

    fn push(
        mut self,
        version: u32,
        tables: Vec<TableDef>,
        migrate: Option<Arc<MigrateFn>>,
    ) -> Result<Self, SchemaError> {
        let mut names = HashSet::new();
        for table in &tables {
            table.validate()?;
            if !names.insert(table.name.as_str()) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }

        if let Some(previous) = self.versions.last() {
            if version <= previous.version {
                return Err(SchemaError::VersionOrder {
                    version,
                    previous: previous.version,
                });
            }
            if migrate.is_none() {
                check_additive(version, previous, &tables)?;
            }
        } else if version == 0 {
            return Err(SchemaError::VersionOrder {
                version,
                previous: 0,
            });
        }

        self.versions.push(SchemaVersion {
            version,
            tables,
            migrate,
        });
        Ok(self)
    }

    /// The newest registered version.
    pub fn current(&self) -> Result<&SchemaVersion, SchemaError> {
        self.versions.last().ok_or(SchemaError::NoVersions)
    }

    pub fn versions(&self) -> &[SchemaVersion] {
        &self.versions
    }

    /// Versions strictly newer than `version`, oldest first.
    pub fn versions_after(&self, version: u32) -> impl Iterator<Item = &SchemaVersion> {
        self.versions.iter().filter(move |v| v.version > version)
    }
}

/// Every table and index of `previous` must survive unchanged in `tables`.
fn check_additive(
    version: u32,
    previous: &SchemaVersion,
    tables: &[TableDef],
) -> Result<(), SchemaError> {
    for old_table in &previous.tables {
        let Some(new_table) = tables.iter().find(|t| t.name == old_table.name) else {
            return Err(SchemaError::DestructiveChange {
                version,
                what: "table",
                name: old_table.name.clone(),
            });
        };
        for old_index in &old_table.indexes {
            if new_table.find_index(&old_index.name) != Some(old_index) {
                return Err(SchemaError::DestructiveChange {
                    version,
                    what: "index",
                    name: format!("{}.{}", old_table.name, old_index.name),
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
