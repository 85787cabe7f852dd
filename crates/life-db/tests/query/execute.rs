//! Integration tests for query planning and execution.

use life_db::{
    error::{LifeDbError, QueryError, StorageError},
    index::{explain_plan, plan_query, KeyRange, ScanType},
    query::{
        execute_query, find_first,
        operators::{field_contains, field_eq},
        IndexQuery, Query, SortEntry,
    },
    schema::{SchemaRegistry, TableDef},
    storage::{MemoryBackend, Store},
};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

fn seeded() -> Store<MemoryBackend> {
    let registry = SchemaRegistry::new()
        .register(
            1,
            vec![TableDef::new("actions")
                .index("status")
                .index("createdAt")
                .index("dueDate")],
        )
        .unwrap();
    let store = Store::open(MemoryBackend::new(), &registry).unwrap();
    let rows = [
        json!({"title": "a", "status": "planned", "createdAt": 100, "priority": 2, "tags": ["home"]}),
        json!({"title": "b", "status": "done", "createdAt": 200, "dueDate": 500, "priority": 1}),
        json!({"title": "c", "status": "planned", "createdAt": 300, "dueDate": 400, "priority": 3}),
        json!({"title": "d", "status": "planned", "createdAt": 50, "dueDate": 600, "priority": 2, "tags": ["work"]}),
    ];
    for row in rows {
        store.add("actions", row).unwrap();
    }
    store
}

fn titles(records: &[Value]) -> Vec<&str> {
    records.iter().map(|r| r["title"].as_str().unwrap()).collect()
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn exact_index_query_returns_records_in_key_order() {
    let store = seeded();
    let query = Query::scan(IndexQuery::range("status", KeyRange::only("planned")));
    let result = execute_query(&store, "actions", &query).unwrap();
    assert_eq!(titles(&result.records), vec!["a", "c", "d"]);
    assert_eq!(result.total, 3);
}

#[test]
fn union_returns_each_record_once() {
    let store = seeded();
    let query = Query::union(vec![
        IndexQuery::range("createdAt", KeyRange::above_or_equal(200)),
        IndexQuery::range("dueDate", KeyRange::above_or_equal(450)),
    ]);
    let result = execute_query(&store, "actions", &query).unwrap();
    let mut got = titles(&result.records);
    got.sort();
    assert_eq!(got, vec!["b", "c", "d"]);
    assert_eq!(result.total, 3);
}

#[test]
fn filter_then_total_then_sort_then_paginate() {
    let store = seeded();
    let query = Query::scan(IndexQuery::range("status", KeyRange::only("planned")))
        .with_filter(|r| r["priority"].as_i64().unwrap_or(0) >= 2)
        .with_sort(vec![SortEntry::desc("priority"), SortEntry::asc("title")])
        .with_offset(1)
        .with_limit(1);
    let result = execute_query(&store, "actions", &query).unwrap();
    assert_eq!(result.total, 3);
    assert_eq!(titles(&result.records), vec!["a"]);
}

#[test]
fn reversed_index_scan_without_sort() {
    let store = seeded();
    let query = Query::scan(IndexQuery::index("createdAt").reversed());
    let result = execute_query(&store, "actions", &query).unwrap();
    assert_eq!(titles(&result.records), vec!["c", "b", "a", "d"]);
}

#[test]
fn predicate_helpers_compose() {
    let store = seeded();
    let query = Query::default().with_predicate(
        field_eq("status", "planned").and(field_contains("tags", "work").not()),
    );
    let result = execute_query(&store, "actions", &query).unwrap();
    assert_eq!(titles(&result.records), vec!["a", "c"]);
}

#[test]
fn find_first_respects_sort() {
    let store = seeded();
    let query = Query::default().with_sort(vec![SortEntry::asc("createdAt")]);
    let first = find_first(&store, "actions", &query).unwrap().unwrap();
    assert_eq!(first["title"], "d");
    let none = find_first(
        &store,
        "actions",
        &Query::scan(IndexQuery::range("status", KeyRange::only("archived"))),
    )
    .unwrap();
    assert!(none.is_none());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn invalid_queries_fail_before_scanning() {
    let store = seeded();
    let err = |q: Query| execute_query(&store, "actions", &q).unwrap_err();

    assert!(matches!(
        err(Query::scan(IndexQuery::index("owner"))),
        LifeDbError::Query(QueryError::UnknownIndex { .. })
    ));
    assert!(matches!(
        err(Query::union(vec![])),
        LifeDbError::Query(QueryError::EmptyUnion { .. })
    ));
    assert!(matches!(
        err(Query::scan(IndexQuery::range(
            "createdAt",
            KeyRange::between(10, "z", true, true)
        ))),
        LifeDbError::Query(QueryError::InvalidBound { .. })
    ));
    assert!(matches!(
        err(Query::scan(IndexQuery::range("createdAt", KeyRange::only(f64::NAN)))),
        LifeDbError::Query(QueryError::InvalidBound { .. })
    ));
    assert!(matches!(
        execute_query(&store, "missing", &Query::default()).unwrap_err(),
        LifeDbError::Storage(StorageError::UnknownTable(_))
    ));
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn plan_classifies_scans_and_explains_them() {
    let store = seeded();
    let def = store.schema().table("actions").unwrap();

    let exact = plan_query(
        def,
        &Query::scan(IndexQuery::range("status", KeyRange::only("done"))),
    )
    .unwrap();
    assert_eq!(exact.scans[0].scan_type, ScanType::Exact);

    let union = plan_query(
        def,
        &Query::union(vec![
            IndexQuery::range("createdAt", KeyRange::above(1)),
            IndexQuery::range("dueDate", KeyRange::above(1)),
        ])
        .with_limit(5),
    )
    .unwrap();
    assert!(union.dedupe);
    let text = explain_plan(&union);
    assert!(text.contains("Union of 2 scans"), "{text}");
    assert!(text.contains("[2] Index: dueDate"), "{text}");
    assert!(text.contains("Limit: 5"), "{text}");

    let sorted = plan_query(
        def,
        &Query::scan(IndexQuery::index("createdAt")).with_sort(vec![SortEntry::asc("createdAt")]),
    )
    .unwrap();
    assert!(sorted.index_provides_sort);
    assert!(sorted.post_sort.is_none());
    assert!(exact.estimated_cost < union.estimated_cost);
}
