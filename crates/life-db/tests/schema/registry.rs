//! Integration tests for `SchemaRegistry` and upgrade planning.

use life_db::{
    error::SchemaError,
    schema::{plan_upgrade, IndexDef, SchemaRegistry, TableDef},
};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn v1() -> SchemaRegistry {
    SchemaRegistry::new()
        .register(
            1,
            vec![
                TableDef::new("actions").index("status"),
                TableDef::new("goals"),
            ],
        )
        .expect("register v1")
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn additive_version_is_accepted() {
    let registry = v1()
        .register(
            2,
            vec![
                TableDef::new("actions").index("status").index("dueDate"),
                TableDef::new("goals"),
                TableDef::new("routines"),
            ],
        )
        .expect("additive v2");
    assert_eq!(registry.current().unwrap().version, 2);
    assert_eq!(registry.versions_after(1).count(), 1);
}

#[test]
fn dropping_a_table_without_migration_is_rejected() {
    let err = v1()
        .register(2, vec![TableDef::new("actions").index("status")])
        .unwrap_err();
    assert!(matches!(err, SchemaError::DestructiveChange { version: 2, .. }));
}

#[test]
fn retyping_an_index_without_migration_is_rejected() {
    let err = v1()
        .register(
            2,
            vec![
                TableDef::new("actions").index_named("status", "state.code"),
                TableDef::new("goals"),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, SchemaError::DestructiveChange { .. }));
}

#[test]
fn destructive_version_with_migration_is_accepted() {
    let registry = v1()
        .register_with_migration(2, vec![TableDef::new("actions")], |_, record| Ok(record))
        .expect("migrating v2");
    assert!(registry.current().unwrap().migrate.is_some());
}

#[test]
fn versions_must_increase() {
    let err = v1().register(1, vec![]).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::VersionOrder {
            version: 1,
            previous: 1
        }
    ));
}

#[test]
fn invalid_and_duplicate_names_are_rejected() {
    assert!(matches!(
        SchemaRegistry::new()
            .register(1, vec![TableDef::new("bad-name")])
            .unwrap_err(),
        SchemaError::InvalidName { .. }
    ));
    assert!(matches!(
        SchemaRegistry::new()
            .register(1, vec![TableDef::new("a"), TableDef::new("a")])
            .unwrap_err(),
        SchemaError::DuplicateTable(_)
    ));
    assert!(matches!(
        SchemaRegistry::new()
            .register(1, vec![TableDef::new("a").index("x").index_named("x", "y")])
            .unwrap_err(),
        SchemaError::DuplicateIndex { .. }
    ));
}

#[test]
fn empty_registry_has_no_current_version() {
    assert!(matches!(
        SchemaRegistry::new().current().unwrap_err(),
        SchemaError::NoVersions
    ));
}

// ============================================================================
// Upgrade planning
// ============================================================================

#[test]
fn fresh_store_creates_every_index_and_runs_no_migration() {
    let registry = v1()
        .register_with_migration(
            2,
            vec![TableDef::new("actions").index("status")],
            |_, mut record| {
                record["migrated"] = json!(true);
                Ok(record)
            },
        )
        .unwrap();
    let plan = plan_upgrade(&registry, None, &[]).unwrap();
    assert_eq!(plan.to, 2);
    assert!(plan.migrations.is_empty());
    assert_eq!(
        plan.create_indexes,
        vec![(
            "actions".to_string(),
            IndexDef {
                name: "status".into(),
                key_path: "status".into()
            }
        )]
    );
}

#[test]
fn upgrade_runs_pending_migrations_and_diffs_indexes() {
    let registry = v1()
        .register_with_migration(
            2,
            vec![TableDef::new("actions").index("dueDate")],
            |_, record| Ok(record),
        )
        .unwrap();
    let stored = v1().current().unwrap().tables.clone();
    let plan = plan_upgrade(&registry, Some(1), &stored).unwrap();
    assert_eq!(plan.from, Some(1));
    assert_eq!(plan.migrations.len(), 1);
    assert_eq!(plan.dropped_tables, vec!["goals".to_string()]);
    assert_eq!(plan.drop_indexes.len(), 1);
    assert_eq!(plan.create_indexes.len(), 1);
}

#[test]
fn current_version_is_a_noop() {
    let registry = v1();
    let stored = registry.current().unwrap().tables.clone();
    assert!(plan_upgrade(&registry, Some(1), &stored).unwrap().is_noop());
}

#[test]
fn newer_stored_version_is_a_downgrade() {
    let err = plan_upgrade(&v1(), Some(3), &[]).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::Downgrade {
            stored: 3,
            registered: 1
        }
    ));
}
