//! Named queries the application screens use.
//!
//! Each comes as a `*_query` builder, usable with
//! [`LocalRepository::with_query`](super::LocalRepository::with_query) for a
//! live view, and a function that runs it once.

use chrono::{DateTime, NaiveDate, Utc};

use crate::entities::{Action, Event, Goal, GoalStatus, LocalEntity, PersonalState};
use crate::error::Result;
use crate::index::types::KeyRange;
use crate::query::types::{IndexQuery, Query};
use crate::reactive::LiveStore;
use crate::storage::traits::StorageBackend;

use super::routines::day_bounds;

fn run<T: LocalEntity, B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    query: &Query,
) -> Result<Vec<T>> {
    store
        .query(T::TABLE, query)?
        .records
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(Into::into))
        .collect()
}

fn millis_range(from: DateTime<Utc>, to: DateTime<Utc>) -> KeyRange {
    KeyRange::between(from, to, true, false)
}

/// Actions created on or after `day`, or due on or after it. Each action
/// appears once even when both hold.
pub fn actions_for_day_query(day: NaiveDate) -> Query {
    let (start, _) = day_bounds(day);
    Query::union(vec![
        IndexQuery::range("createdAt", KeyRange::above_or_equal(start)),
        IndexQuery::range("dueDate", KeyRange::above_or_equal(start)),
    ])
}

pub fn actions_for_day<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    day: NaiveDate,
) -> Result<Vec<Action>> {
    run(store, &actions_for_day_query(day))
}

/// Goals in `status`, in key order.
pub fn goals_with_status_query(status: GoalStatus) -> Query {
    Query::scan(IndexQuery::range("status", KeyRange::only(status.as_str())))
}

pub fn goals_with_status<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    status: GoalStatus,
) -> Result<Vec<Goal>> {
    run(store, &goals_with_status_query(status))
}

/// Events starting in `[from, to)`, earliest first.
pub fn events_between_query(from: DateTime<Utc>, to: DateTime<Utc>) -> Query {
    Query::scan(IndexQuery::range("startTime", millis_range(from, to)))
}

pub fn events_between<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Event>> {
    run(store, &events_between_query(from, to))
}

/// States recorded in `[from, to)`, most recent first.
pub fn states_between_query(from: DateTime<Utc>, to: DateTime<Utc>) -> Query {
    Query::scan(IndexQuery::range("timestamp", millis_range(from, to)).reversed())
}

pub fn states_between<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<PersonalState>> {
    run(store, &states_between_query(from, to))
}
