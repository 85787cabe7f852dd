//! Index key and range definitions for index scans.
//! Keys are ordered by kind first (bool < number < string), then by value.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

// ============================================================================
// Index Keys
// ============================================================================

/// A value that can be stored in an index.
///
/// Null, arrays, objects and non-finite numbers are not indexable: a record
/// holding one of those at the indexed path is left out of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexKey {
    Bool(bool),
    Number(f64),
    String(String),
}

impl IndexKey {
    /// Extract an index key from a JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(Self::Number),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::String(_) => 2,
        }
    }

    /// Short name of the key kind, used in error messages and plan output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    pub fn same_kind(&self, other: &IndexKey) -> bool {
        self.rank() == other.rank()
    }

    /// Total order over keys: kind rank first, then value.
    pub fn cmp_key(&self, other: &IndexKey) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// JSON form of the key.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for IndexKey {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for IndexKey {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for IndexKey {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for IndexKey {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Timestamps are indexed as epoch milliseconds.
impl From<DateTime<Utc>> for IndexKey {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Number(t.timestamp_millis() as f64)
    }
}

// ============================================================================
// Ranges
// ============================================================================

/// Bound for range scans.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    pub value: IndexKey,
    pub inclusive: bool,
}

/// A key range over one index. A missing bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyRange {
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

impl KeyRange {
    /// Exactly `key`.
    pub fn only(key: impl Into<IndexKey>) -> Self {
        let key = key.into();
        Self {
            lower: Some(RangeBound {
                value: key.clone(),
                inclusive: true,
            }),
            upper: Some(RangeBound {
                value: key,
                inclusive: true,
            }),
        }
    }

    /// Strictly greater than `key`.
    pub fn above(key: impl Into<IndexKey>) -> Self {
        Self {
            lower: Some(RangeBound {
                value: key.into(),
                inclusive: false,
            }),
            upper: None,
        }
    }

    pub fn above_or_equal(key: impl Into<IndexKey>) -> Self {
        Self {
            lower: Some(RangeBound {
                value: key.into(),
                inclusive: true,
            }),
            upper: None,
        }
    }

    /// Strictly less than `key`.
    pub fn below(key: impl Into<IndexKey>) -> Self {
        Self {
            lower: None,
            upper: Some(RangeBound {
                value: key.into(),
                inclusive: false,
            }),
        }
    }

    pub fn below_or_equal(key: impl Into<IndexKey>) -> Self {
        Self {
            lower: None,
            upper: Some(RangeBound {
                value: key.into(),
                inclusive: true,
            }),
        }
    }

    pub fn between(
        lower: impl Into<IndexKey>,
        upper: impl Into<IndexKey>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Self {
        Self {
            lower: Some(RangeBound {
                value: lower.into(),
                inclusive: lower_inclusive,
            }),
            upper: Some(RangeBound {
                value: upper.into(),
                inclusive: upper_inclusive,
            }),
        }
    }

    /// Whether `key` falls inside the range. A key of a different kind than a
    /// bound never matches that bound.
    pub fn contains(&self, key: &IndexKey) -> bool {
        if let Some(lower) = &self.lower {
            if !lower.value.same_kind(key) {
                return false;
            }
            match key.cmp_key(&lower.value) {
                Ordering::Less => return false,
                Ordering::Equal if !lower.inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            if !upper.value.same_kind(key) {
                return false;
            }
            match key.cmp_key(&upper.value) {
                Ordering::Greater => return false,
                Ordering::Equal if !upper.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Reject NaN bounds, bounds of different kinds and inverted ranges.
    /// `index` is only used to label the error.
    pub fn validate(&self, index: &str) -> Result<(), QueryError> {
        for bound in [&self.lower, &self.upper].into_iter().flatten() {
            if let IndexKey::Number(n) = bound.value {
                if !n.is_finite() {
                    return Err(QueryError::InvalidBound {
                        index: index.to_string(),
                        reason: format!("bound {n} is not a finite number"),
                    });
                }
            }
        }

        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            if !lower.value.same_kind(&upper.value) {
                return Err(QueryError::InvalidBound {
                    index: index.to_string(),
                    reason: format!(
                        "lower bound is a {} but upper bound is a {}",
                        lower.value.kind_name(),
                        upper.value.kind_name()
                    ),
                });
            }
            match lower.value.cmp_key(&upper.value) {
                Ordering::Greater => {
                    return Err(QueryError::InvertedRange {
                        index: index.to_string(),
                    })
                }
                Ordering::Equal if !(lower.inclusive && upper.inclusive) => {
                    return Err(QueryError::InvertedRange {
                        index: index.to_string(),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Human-readable interval notation, e.g. `[3, 7)`.
    pub fn describe(&self) -> String {
        let (open, low) = match &self.lower {
            Some(b) => (if b.inclusive { "[" } else { "(" }, b.value.to_string()),
            None => ("(", "-inf".to_string()),
        };
        let (high, close) = match &self.upper {
            Some(b) => (b.value.to_string(), if b.inclusive { "]" } else { ")" }),
            None => ("+inf".to_string(), ")"),
        };
        format!("{open}{low}, {high}{close}")
    }
}

// ============================================================================
// Tests
// ============================================================================
