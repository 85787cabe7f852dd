//! Query type definitions: index scans, residual predicate, sort, pagination.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::types::KeyRange;
use crate::types::ScanRequest;

// ============================================================================
// Sort Types
// ============================================================================

/// Sort direction for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A sort specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

impl SortEntry {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

// ============================================================================
// Predicate
// ============================================================================

/// Residual filter applied to records after the index scan.
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl Predicate {
    pub fn new(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn matches(&self, record: &Value) -> bool {
        (self.0)(record)
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::new(move |r| self.matches(r) && other.matches(r))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::new(move |r| self.matches(r) || other.matches(r))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::new(move |r| !self.matches(r))
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Predicate(<fn>)")
    }
}

// ============================================================================
// Scans
// ============================================================================

/// One ordered scan: a whole table, a whole index, or a key range of an index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexQuery {
    pub index: Option<String>,
    pub range: Option<KeyRange>,
    pub reverse: bool,
}

impl IndexQuery {
    /// Every record in primary-key order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every record with an indexable value for `index`, in index order.
    pub fn index(index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::default()
        }
    }

    pub fn range(index: impl Into<String>, range: KeyRange) -> Self {
        Self {
            index: Some(index.into()),
            range: Some(range),
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    pub fn to_scan_request(&self) -> ScanRequest {
        ScanRequest {
            index: self.index.clone(),
            range: self.range.clone(),
            reverse: self.reverse,
        }
    }
}

/// Where a query's candidate records come from.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Scan(IndexQuery),
    /// Concatenation of several scans, de-duplicated by primary key (first
    /// occurrence wins).
    Union(Vec<IndexQuery>),
}

impl Default for QuerySource {
    fn default() -> Self {
        Self::Scan(IndexQuery::all())
    }
}

// ============================================================================
// Query Type
// ============================================================================

/// Complete query specification: source scans, residual filter, sort, and
/// pagination.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub source: QuerySource,
    pub filter: Option<Predicate>,
    /// Stable sort applied after filtering. `None` keeps scan order.
    pub sort: Option<Vec<SortEntry>>,
    /// Maximum number of results to return.
    pub limit: Option<usize>,
    /// Number of results to skip.
    pub offset: Option<usize>,
}

impl Query {
    pub fn scan(scan: IndexQuery) -> Self {
        Self {
            source: QuerySource::Scan(scan),
            ..Self::default()
        }
    }

    pub fn union(scans: Vec<IndexQuery>) -> Self {
        Self {
            source: QuerySource::Union(scans),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Predicate::new(f));
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortEntry>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The scans this query reads, in order.
    pub fn scans(&self) -> &[IndexQuery] {
        match &self.source {
            QuerySource::Scan(scan) => std::slice::from_ref(scan),
            QuerySource::Union(scans) => scans,
        }
    }
}

// ============================================================================
// Query Result
// ============================================================================

/// Result of executing a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Matching records (after filter, sort, and pagination).
    pub records: Vec<Value>,
    /// Total count of matched records before pagination.
    pub total: usize,
}
