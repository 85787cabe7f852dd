//! Value comparison, field path resolution, and predicate building blocks
//! for the query engine.

use std::cmp::Ordering;

use serde_json::Value;

use super::types::Predicate;

// ============================================================================
// Value Comparison
// ============================================================================

/// Compare two JSON values for ordering.
///
/// - Both Null → Equal
/// - a is Null → Greater (nulls sort to end)
/// - b is Null → Less
/// - Both numbers → f64 comparison (NaN treated as Equal)
/// - Both strings → lexicographic (codepoint order)
/// - Both booleans → false < true
/// - Cross-type → type rank: bool(0), number(1), string(2), other(3),
///   the same kind order as index keys
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(na), Value::Number(nb)) => {
            let fa = na.as_f64().unwrap_or(f64::NAN);
            let fb = nb.as_f64().unwrap_or(f64::NAN);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        _ => 3,
    }
}

// ============================================================================
// Field Path Resolution
// ============================================================================

/// Get a nested value from a record using a dot-separated path.
/// Returns `None` if any path segment is missing or the parent is not an object.
pub fn get_field_value<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

// ============================================================================
// Predicates
// ============================================================================

/// Field at `path` equals `value`. A missing field never matches.
pub fn field_eq(path: impl Into<String>, value: impl Into<Value>) -> Predicate {
    let path = path.into();
    let value = value.into();
    Predicate::new(move |r| get_field_value(r, &path) == Some(&value))
}

/// Field at `path` equals one of `values`.
pub fn field_in(path: impl Into<String>, values: Vec<Value>) -> Predicate {
    let path = path.into();
    Predicate::new(move |r| get_field_value(r, &path).is_some_and(|v| values.contains(v)))
}

/// Field at `path` is present and not null.
pub fn field_exists(path: impl Into<String>) -> Predicate {
    let path = path.into();
    Predicate::new(move |r| get_field_value(r, &path).is_some_and(|v| !v.is_null()))
}

/// Field at `path` is a list containing `value` (e.g. a tag).
pub fn field_contains(path: impl Into<String>, value: impl Into<Value>) -> Predicate {
    let path = path.into();
    let value = value.into();
    Predicate::new(move |r| {
        get_field_value(r, &path)
            .and_then(Value::as_array)
            .is_some_and(|items| items.contains(&value))
    })
}

// ============================================================================
// Tests (inline unit tests)
// ============================================================================
