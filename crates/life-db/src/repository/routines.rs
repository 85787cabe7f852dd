//! Routine completion tracking.
//!
//! A routine is completed on a day when it has a completed log whose
//! timestamp falls inside that UTC day. [`log_routine`] keeps at most one log
//! per (routine, day) by updating the existing one.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::entities::{LocalEntity, Routine, RoutineLog};
use crate::error::{Result, StorageError};
use crate::index::types::KeyRange;
use crate::reactive::LiveStore;
use crate::storage::traits::StorageBackend;
use crate::types::{RecordKey, ScanRequest};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// `[start, end)` of `day` in epoch milliseconds.
pub fn day_bounds(day: NaiveDate) -> (i64, i64) {
    let start = day.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    (start, start + DAY_MS)
}

/// Range over a millisecond timestamp index covering `day`.
pub fn day_range(day: NaiveDate) -> KeyRange {
    let (start, end) = day_bounds(day);
    KeyRange::between(start, end, true, false)
}

/// Record that `routine_id` was completed at `at`.
///
/// Runs in one store transaction: if a log for the same routine already
/// exists on the same UTC day it is updated, otherwise a new log is added.
/// Fails with `NotFound` when the routine does not exist.
pub fn log_routine<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    routine_id: RecordKey,
    at: DateTime<Utc>,
    notes: Option<String>,
) -> Result<RoutineLog> {
    let (start, end) = day_bounds(at.date_naive());
    let log = RoutineLog {
        id: None,
        routine_id,
        timestamp: at,
        completed: true,
        notes,
    };

    store.transaction(move |tx| {
        if tx.get(Routine::TABLE, routine_id)?.is_none() {
            return Err(StorageError::NotFound {
                table: Routine::TABLE.to_string(),
                key: routine_id,
            }
            .into());
        }

        let existing = tx
            .scan(
                RoutineLog::TABLE,
                &ScanRequest::range("routineId", KeyRange::only(routine_id)),
            )?
            .into_iter()
            .find(|r| {
                r.data
                    .get("timestamp")
                    .and_then(Value::as_i64)
                    .is_some_and(|ts| ts >= start && ts < end)
            });

        let body = serde_json::to_value(&log)?;
        let stored = match existing {
            Some(record) => {
                debug!(routine_id, key = record.key, "updating same-day routine log");
                tx.update(RoutineLog::TABLE, record.key, body)?
            }
            None => {
                let key = tx.add(RoutineLog::TABLE, body)?;
                tx.get(RoutineLog::TABLE, key)?
                    .ok_or_else(|| StorageError::NotFound {
                        table: RoutineLog::TABLE.to_string(),
                        key,
                    })?
            }
        };
        Ok(serde_json::from_value(stored)?)
    })
}

/// Ids of the routines with a completed log on `day`, ascending.
pub fn routines_completed_on<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    day: NaiveDate,
) -> Result<Vec<RecordKey>> {
    let logs = store.scan(
        RoutineLog::TABLE,
        &ScanRequest::range("timestamp", day_range(day)),
    )?;
    let ids: BTreeSet<RecordKey> = logs
        .iter()
        .filter(|r| r.data.get("completed").and_then(Value::as_bool) != Some(false))
        .filter_map(|r| r.data.get("routineId").and_then(Value::as_i64))
        .collect();
    Ok(ids.into_iter().collect())
}

pub fn is_routine_completed_on<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    routine_id: RecordKey,
    day: NaiveDate,
) -> Result<bool> {
    Ok(routines_completed_on(store, day)?.contains(&routine_id))
}
