//! Index scan evaluation over materialized records.
//!
//! Shared by backends that cannot (fully) answer an index scan natively: the
//! memory backend evaluates every scan here, SQLite uses it to apply exact
//! bound semantics after narrowing with SQL.

use serde_json::Value;

use crate::query::operators::get_field_value;
use crate::schema::registry::IndexDef;
use crate::types::StoredRecord;

use super::types::{IndexKey, KeyRange};

/// The index key of `record` at `key_path`, if it has an indexable value there.
pub fn index_key_of(record: &Value, key_path: &str) -> Option<IndexKey> {
    get_field_value(record, key_path).and_then(IndexKey::from_value)
}

/// Keep the records that belong to `index` and fall inside `range`, ordered
/// by index key then primary key (descending if `reverse`).
pub fn order_index_scan(
    records: impl IntoIterator<Item = StoredRecord>,
    index: &IndexDef,
    range: Option<&KeyRange>,
    reverse: bool,
) -> Vec<StoredRecord> {
    let mut keyed: Vec<(IndexKey, StoredRecord)> = records
        .into_iter()
        .filter_map(|r| {
            let key = index_key_of(&r.data, &index.key_path)?;
            match range {
                Some(range) if !range.contains(&key) => None,
                _ => Some((key, r)),
            }
        })
        .collect();

    keyed.sort_by(|(ka, ra), (kb, rb)| ka.cmp_key(kb).then(ra.key.cmp(&rb.key)));
    if reverse {
        keyed.reverse();
    }
    keyed.into_iter().map(|(_, r)| r).collect()
}
