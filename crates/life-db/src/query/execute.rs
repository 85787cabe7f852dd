//! Query execution engine: index scans, then residual filter, sort, and
//! pagination.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{Result, StorageError};
use crate::index::planner::{plan_query, QueryPlan};
use crate::storage::{store::Store, traits::StorageBackend};
use crate::types::{ScanRequest, StoredRecord};

use super::operators::{compare_values, get_field_value};
use super::types::{Query, QueryResult, SortDirection, SortEntry};

// ============================================================================
// Sorting
// ============================================================================

/// Sort records by multiple fields with cascading priority.
/// The sort is stable: records that compare equal keep their scan order.
pub fn sort_records(mut records: Vec<Value>, sort: &[SortEntry]) -> Vec<Value> {
    if sort.is_empty() {
        return records;
    }

    records.sort_by(|a, b| {
        for entry in sort {
            let va = get_field_value(a, &entry.field).unwrap_or(&Value::Null);
            let vb = get_field_value(b, &entry.field).unwrap_or(&Value::Null);
            let cmp = compare_values(va, vb);
            if cmp != std::cmp::Ordering::Equal {
                return if entry.direction == SortDirection::Desc {
                    cmp.reverse()
                } else {
                    cmp
                };
            }
        }
        std::cmp::Ordering::Equal
    });

    records
}

// ============================================================================
// Pagination
// ============================================================================

/// Apply offset then limit to a list of records.
pub fn paginate_records(
    records: Vec<Value>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Vec<Value> {
    let iter = records.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

// ============================================================================
// Query Execution
// ============================================================================

/// Concatenate scan results, keeping the first occurrence of each key.
pub fn union_records(batches: Vec<Vec<StoredRecord>>) -> Vec<Value> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(r.key))
        .map(|r| r.data)
        .collect()
}

/// Plan and execute `query` against `table`.
///
/// 1. Run each scan (union results are de-duplicated by primary key).
/// 2. Apply the residual filter.
/// 3. Capture total count (after filter, before pagination).
/// 4. Sort (stable).
/// 5. Paginate (offset then limit).
pub fn execute_query<B: StorageBackend>(
    store: &Store<B>,
    table: &str,
    query: &Query,
) -> Result<QueryResult> {
    let def = store
        .schema()
        .table(table)
        .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
    let plan = plan_query(def, query)?;
    execute_plan(store, &plan, query)
}

/// Execute an already validated plan.
pub fn execute_plan<B: StorageBackend>(
    store: &Store<B>,
    plan: &QueryPlan,
    query: &Query,
) -> Result<QueryResult> {
    // 1. Scan
    let mut batches = Vec::with_capacity(plan.scans.len());
    for scan in &plan.scans {
        let request = ScanRequest {
            index: scan.index.clone(),
            range: scan.range.clone(),
            reverse: scan.reverse,
        };
        batches.push(store.scan(&plan.table, &request)?);
    }
    let candidates = union_records(batches);

    // 2. Filter
    let filtered: Vec<Value> = match &query.filter {
        Some(predicate) => candidates
            .into_iter()
            .filter(|r| predicate.matches(r))
            .collect(),
        None => candidates,
    };

    // 3. Capture total
    let total = filtered.len();

    // 4. Sort
    let sorted = match &plan.post_sort {
        Some(entries) => sort_records(filtered, entries),
        None => filtered,
    };

    // 5. Paginate
    let records = paginate_records(sorted, plan.offset, plan.limit);

    Ok(QueryResult { records, total })
}

/// Find the first record matching a query, or `None` if no records match.
pub fn find_first<B: StorageBackend>(
    store: &Store<B>,
    table: &str,
    query: &Query,
) -> Result<Option<Value>> {
    let limited = Query {
        limit: Some(1),
        ..query.clone()
    };
    let result = execute_query(store, table, &limited)?;
    Ok(result.records.into_iter().next())
}

// ============================================================================
// Tests
// ============================================================================
