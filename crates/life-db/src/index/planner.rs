//! Query planner: validates a query against a table definition and decides
//! how to execute it.
//!
//! Every scan is checked against the table's declared indexes and its range
//! is validated up front, so execution never starts on a malformed query.

use crate::error::QueryError;
use crate::query::types::{Query, QuerySource, SortDirection, SortEntry};
use crate::schema::registry::TableDef;

use super::types::KeyRange;

// ============================================================================
// Public Types
// ============================================================================

/// Type of scan operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// Single key on an index (`KeyRange::only`).
    Exact,
    /// Bounded on at least one side.
    Range,
    /// Full traversal of an index.
    Index,
    /// Full traversal of the table in primary-key order.
    Table,
}

/// One planned scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub scan_type: ScanType,
    pub index: Option<String>,
    pub key_path: Option<String>,
    pub range: Option<KeyRange>,
    pub reverse: bool,
}

/// The output of the query planner: how to execute a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub table: String,
    /// Scans to run in order. More than one means a union.
    pub scans: Vec<ScanPlan>,
    /// Whether scan results are de-duplicated by primary key.
    pub dedupe: bool,
    /// Whether a residual predicate runs after the scans.
    pub post_filter: bool,
    /// Whether the single scan already yields the requested order.
    pub index_provides_sort: bool,
    /// Sort to apply after filtering (None if not requested or provided by the index).
    pub post_sort: Option<Vec<SortEntry>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Estimated relative cost (1 = single key, 6 = full table scan), summed over scans.
    pub estimated_cost: f64,
}

// ============================================================================
// Planning
// ============================================================================

fn scan_cost(scan_type: ScanType) -> f64 {
    match scan_type {
        ScanType::Exact => 1.0,
        ScanType::Range => 2.0,
        ScanType::Index => 4.0,
        ScanType::Table => 6.0,
    }
}

fn is_exact(range: &KeyRange) -> bool {
    match (&range.lower, &range.upper) {
        (Some(l), Some(u)) => l.inclusive && u.inclusive && l.value == u.value,
        _ => false,
    }
}

/// Validate `query` against `table` and produce a [`QueryPlan`].
pub fn plan_query(table: &TableDef, query: &Query) -> Result<QueryPlan, QueryError> {
    if let QuerySource::Union(scans) = &query.source {
        if scans.is_empty() {
            return Err(QueryError::EmptyUnion {
                table: table.name.clone(),
            });
        }
    }

    let mut scans = Vec::new();
    for scan in query.scans() {
        let planned = match &scan.index {
            None => {
                if scan.range.is_some() {
                    return Err(QueryError::RangeWithoutIndex {
                        table: table.name.clone(),
                    });
                }
                ScanPlan {
                    scan_type: ScanType::Table,
                    index: None,
                    key_path: None,
                    range: None,
                    reverse: scan.reverse,
                }
            }
            Some(name) => {
                let index = table
                    .find_index(name)
                    .ok_or_else(|| QueryError::UnknownIndex {
                        table: table.name.clone(),
                        index: name.clone(),
                    })?;
                let scan_type = match &scan.range {
                    Some(range) => {
                        range.validate(name)?;
                        if is_exact(range) {
                            ScanType::Exact
                        } else if range.lower.is_none() && range.upper.is_none() {
                            ScanType::Index
                        } else {
                            ScanType::Range
                        }
                    }
                    None => ScanType::Index,
                };
                ScanPlan {
                    scan_type,
                    index: Some(index.name.clone()),
                    key_path: Some(index.key_path.clone()),
                    range: scan.range.clone(),
                    reverse: scan.reverse,
                }
            }
        };
        scans.push(planned);
    }

    // A single non-reversed index scan already yields ascending order on its
    // key path, with ties broken by primary key just like a stable sort.
    let index_provides_sort = match (scans.as_slice(), &query.sort) {
        ([only], Some(sort)) => {
            sort.len() == 1
                && sort[0].direction == SortDirection::Asc
                && !only.reverse
                && only.key_path.as_deref() == Some(sort[0].field.as_str())
        }
        _ => false,
    };
    let post_sort = if index_provides_sort {
        None
    } else {
        query.sort.clone()
    };

    let estimated_cost = scans.iter().map(|s| scan_cost(s.scan_type)).sum();

    Ok(QueryPlan {
        table: table.name.clone(),
        dedupe: scans.len() > 1,
        scans,
        post_filter: query.filter.is_some(),
        index_provides_sort,
        post_sort,
        offset: query.offset,
        limit: query.limit,
        estimated_cost,
    })
}

// ============================================================================
// Explain
// ============================================================================

/// Render a plan as human-readable lines, one fact per line.
pub fn explain_plan(plan: &QueryPlan) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("Table: {}", plan.table));

    if plan.scans.len() > 1 {
        lines.push(format!(
            "Union of {} scans (dedupe by key)",
            plan.scans.len()
        ));
    }

    for (i, scan) in plan.scans.iter().enumerate() {
        let prefix = if plan.scans.len() > 1 {
            format!("[{}] ", i + 1)
        } else {
            String::new()
        };
        match &scan.index {
            Some(index) => lines.push(format!("{prefix}Index: {index}")),
            None => lines.push(format!("{prefix}Full table scan")),
        }
        lines.push(format!(
            "{prefix}Scan type: {}",
            match scan.scan_type {
                ScanType::Exact => "exact",
                ScanType::Range => "range",
                ScanType::Index => "index",
                ScanType::Table => "table",
            }
        ));
        if let Some(range) = &scan.range {
            lines.push(format!("{prefix}Range: {}", range.describe()));
        }
        lines.push(format!(
            "{prefix}Direction: {}",
            if scan.reverse { "desc" } else { "asc" }
        ));
    }

    lines.push(format!(
        "Post-filter: {}",
        if plan.post_filter { "yes" } else { "no" }
    ));

    match &plan.post_sort {
        Some(sort) => {
            let fields: Vec<String> = sort
                .iter()
                .map(|s| {
                    format!(
                        "{} {}",
                        s.field,
                        match s.direction {
                            SortDirection::Asc => "asc",
                            SortDirection::Desc => "desc",
                        }
                    )
                })
                .collect();
            lines.push(format!("Post-sort: {}", fields.join(", ")));
        }
        None if plan.index_provides_sort => lines.push("Sort: provided by index".to_string()),
        None => {}
    }

    if let Some(offset) = plan.offset {
        lines.push(format!("Offset: {offset}"));
    }
    if let Some(limit) = plan.limit {
        lines.push(format!("Limit: {limit}"));
    }
    lines.push(format!("Estimated cost: {}", plan.estimated_cost));

    lines.join("\n")
}

// ============================================================================
// Tests
// ============================================================================
