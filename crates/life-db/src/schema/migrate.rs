//! Upgrade planning: compares the persisted schema with the registry and works
//! out which indexes to build or drop, which tables to clear and which
//! migration functions to run, in version order.

use std::sync::Arc;

use crate::error::SchemaError;

use super::registry::{IndexDef, MigrateFn, SchemaRegistry, TableDef};

// ============================================================================
// Public Types
// ============================================================================

/// Everything `Store::open` has to do to bring a persisted store up to the
/// registry's current version.
#[derive(Clone)]
pub struct UpgradePlan {
    /// Persisted version, `None` for a fresh store.
    pub from: Option<u32>,
    pub to: u32,
    /// `(table, index)` pairs to build.
    pub create_indexes: Vec<(String, IndexDef)>,
    /// `(table, index)` pairs to drop.
    pub drop_indexes: Vec<(String, IndexDef)>,
    /// Tables no longer declared; their records are cleared.
    pub dropped_tables: Vec<String>,
    /// Migration functions of every version newer than `from`, oldest first.
    pub migrations: Vec<(u32, Arc<MigrateFn>)>,
    /// Table layout to persist once the upgrade succeeds.
    pub tables: Vec<TableDef>,
}

impl UpgradePlan {
    /// True when the persisted layout already matches the registry.
    pub fn is_noop(&self) -> bool {
        self.from == Some(self.to)
            && self.create_indexes.is_empty()
            && self.drop_indexes.is_empty()
            && self.dropped_tables.is_empty()
            && self.migrations.is_empty()
    }
}

impl std::fmt::Debug for UpgradePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradePlan")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("create_indexes", &self.create_indexes)
            .field("drop_indexes", &self.drop_indexes)
            .field("dropped_tables", &self.dropped_tables)
            .field(
                "migrations",
                &self.migrations.iter().map(|(v, _)| *v).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Plan the upgrade from `(stored_version, stored_tables)` to the registry's
/// current version.
///
/// A persisted version newer than the registry is a downgrade and is refused.
pub fn plan_upgrade(
    registry: &SchemaRegistry,
    stored_version: Option<u32>,
    stored_tables: &[TableDef],
) -> Result<UpgradePlan, SchemaError> {
    let current = registry.current()?;

    if let Some(stored) = stored_version {
        if stored > current.version {
            return Err(SchemaError::Downgrade {
                stored,
                registered: current.version,
            });
        }
    }

    let mut create_indexes = Vec::new();
    let mut drop_indexes = Vec::new();
    let mut dropped_tables = Vec::new();

    for table in &current.tables {
        let old = stored_tables.iter().find(|t| t.name == table.name);
        for index in &table.indexes {
            let unchanged = old.and_then(|t| t.find_index(&index.name)) == Some(index);
            if !unchanged {
                create_indexes.push((table.name.clone(), index.clone()));
            }
        }
    }

    for old in stored_tables {
        match current.table(&old.name) {
            None => {
                dropped_tables.push(old.name.clone());
                for index in &old.indexes {
                    drop_indexes.push((old.name.clone(), index.clone()));
                }
            }
            Some(table) => {
                for index in &old.indexes {
                    if table.find_index(&index.name) != Some(index) {
                        drop_indexes.push((old.name.clone(), index.clone()));
                    }
                }
            }
        }
    }

    let migrations = match stored_version {
        // A fresh store has no records to reshape.
        None => Vec::new(),
        Some(stored) => registry
            .versions_after(stored)
            .filter_map(|v| v.migrate.as_ref().map(|m| (v.version, Arc::clone(m))))
            .collect(),
    };

    Ok(UpgradePlan {
        from: stored_version,
        to: current.version,
        create_indexes,
        drop_indexes,
        dropped_tables,
        migrations,
        tables: current.tables.clone(),
    })
}

// ============================================================================
// Tests
// ============================================================================
