//! End-to-end flows over the application schema.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use life_db::{
    entities::{
        life_schema, Action, ActionStatus, ActionType, Event, EventType, Goal, GoalStatus,
        LocalEntity, PersonalState, Routine, RoutineFrequency, RoutineLog,
    },
    error::{ErrorKind, LifeDbError, StorageError},
    reactive::LiveStore,
    repository::{
        queries::{
            actions_for_day, actions_for_day_query, events_between, goals_with_status,
            states_between,
        },
        routines::{day_bounds, routines_completed_on},
        LocalRepository, Repository,
    },
    storage::{MemoryBackend, StorageBackend},
    types::ScanRequest,
};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn open_memory() -> LiveStore<MemoryBackend> {
    LiveStore::open(MemoryBackend::new(), &life_schema().unwrap()).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn noon(day: NaiveDate) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(day_bounds(day).0).unwrap() + Duration::hours(12)
}

fn action(title: &str, created_at: DateTime<Utc>, due: Option<DateTime<Utc>>) -> Action {
    Action {
        id: None,
        title: title.into(),
        description: None,
        status: ActionStatus::Planned,
        action_type: ActionType::Task,
        created_at,
        due_date: due,
        completed_at: None,
        tags: vec![],
    }
}

fn goal(title: &str, status: GoalStatus) -> Goal {
    Goal {
        id: None,
        title: title.into(),
        description: None,
        status,
        progress: 10,
        created_at: noon(today()),
        target_date: None,
        completed_at: None,
        tags: vec![],
    }
}

fn insert<T: LocalEntity, B: StorageBackend + 'static>(store: &LiveStore<B>, item: &T) -> i64 {
    store
        .add(T::TABLE, serde_json::to_value(item).unwrap())
        .unwrap()
}

// ============================================================================
// Routines
// ============================================================================

fn routine_completed_today_only<B: StorageBackend + 'static>(store: LiveStore<B>) {
    let routine = insert(
        &store,
        &Routine {
            id: None,
            title: "Meditate".into(),
            frequency: RoutineFrequency::Daily,
            active: true,
            description: None,
        },
    );
    insert(
        &store,
        &RoutineLog {
            id: None,
            routine_id: routine,
            timestamp: noon(today()),
            completed: true,
            notes: None,
        },
    );

    let yesterday = today().pred_opt().unwrap();
    assert_eq!(routines_completed_on(&store, today()).unwrap(), vec![routine]);
    assert!(routines_completed_on(&store, yesterday).unwrap().is_empty());
}

#[test]
fn routine_logged_today_counts_today_not_yesterday() {
    routine_completed_today_only(open_memory());
}

#[cfg(feature = "sqlite")]
#[test]
fn routine_logged_today_counts_today_not_yesterday_sqlite() {
    let backend = life_db::storage::SqliteBackend::open_in_memory().unwrap();
    routine_completed_today_only(LiveStore::open(backend, &life_schema().unwrap()).unwrap());
}

// ============================================================================
// Actions
// ============================================================================

#[test]
fn action_created_today_without_due_date_is_returned_once() {
    let store = open_memory();
    let key = insert(&store, &action("Water plants", noon(today()), None));
    insert(
        &store,
        &action("Old", noon(today()) - Duration::days(3), None),
    );

    let found = actions_for_day(&store, today()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, Some(key));
}

#[test]
fn action_matching_both_branches_is_not_duplicated() {
    let store = open_memory();
    let due = noon(today()) + Duration::days(1);
    insert(&store, &action("Both", noon(today()), Some(due)));
    insert(
        &store,
        &action("Due only", noon(today()) - Duration::days(5), Some(due)),
    );

    let result = store.query("actions", &actions_for_day_query(today())).unwrap();
    assert_eq!(result.total, 2);
    let mut titles: Vec<String> = result
        .records
        .iter()
        .map(|r| r["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Both", "Due only"]);
}

#[test]
fn today_query_plan_scans_both_date_indexes() {
    let store = open_memory();
    let text = store.explain("actions", &actions_for_day_query(today())).unwrap();
    assert!(text.contains("Union of 2 scans"), "{text}");
    assert!(text.contains("createdAt"), "{text}");
    assert!(text.contains("dueDate"), "{text}");

    let err = store
        .explain("missing", &actions_for_day_query(today()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
}

#[tokio::test]
async fn live_today_view_follows_new_actions() {
    let store = Arc::new(open_memory());
    let view = LocalRepository::<Action, _>::with_query(
        Arc::clone(&store),
        actions_for_day_query(today()),
    );
    assert!(view.state().data.is_empty());

    view.create(action("Fresh", noon(today()), None)).await.unwrap();
    assert_eq!(view.state().data.len(), 1);
}

// ============================================================================
// Goals
// ============================================================================

#[test]
fn status_query_returns_all_matches_in_index_order() {
    let store = open_memory();
    let first = insert(&store, &goal("Run", GoalStatus::Active));
    insert(&store, &goal("Sleep", GoalStatus::Paused));
    let second = insert(&store, &goal("Read", GoalStatus::Active));

    let active = goals_with_status(&store, GoalStatus::Active).unwrap();
    let keys: Vec<_> = active.iter().map(|g| g.id.unwrap()).collect();
    assert_eq!(keys, vec![first, second]);

    let by_status = store
        .scan("goals", &ScanRequest::by_index("status"))
        .unwrap();
    let statuses: Vec<&str> = by_status
        .iter()
        .map(|r| r.data["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["active", "active", "paused"]);
}

// ============================================================================
// States
// ============================================================================

#[test]
fn states_in_window_are_most_recent_first() {
    let store = open_memory();
    for hour in [8, 20, 14] {
        insert(
            &store,
            &PersonalState {
                id: None,
                timestamp: noon(today()) - Duration::hours(12) + Duration::hours(hour),
                mood: Some(5),
                energy: None,
                stress: None,
                notes: None,
            },
        );
    }
    let from = noon(today()) - Duration::hours(12);
    let states = states_between(&store, from, from + Duration::days(1)).unwrap();
    let hours: Vec<i64> = states
        .iter()
        .map(|s| (s.timestamp - from).num_hours())
        .collect();
    assert_eq!(hours, vec![20, 14, 8]);
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn events_window_is_half_open_and_chronological() {
    let store = open_memory();
    let from = noon(today());
    for (title, offset) in [("late", 3), ("edge", 24), ("early", 0), ("before", -1)] {
        insert(
            &store,
            &Event {
                id: None,
                title: title.into(),
                event_type: EventType::Scheduled,
                start_time: from + Duration::hours(offset),
                end_time: None,
                location: None,
                tags: vec![],
            },
        );
    }
    let events = events_between(&store, from, from + Duration::days(1)).unwrap();
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["early", "late"]);
}

// ============================================================================
// Failed writes
// ============================================================================

#[test]
fn update_of_missing_key_leaves_store_unchanged() {
    let store = open_memory();
    insert(&store, &goal("Run", GoalStatus::Active));
    let before = store.scan("goals", &ScanRequest::all()).unwrap();

    let err = store
        .update("goals", 4242, json!({"title": "Walk"}))
        .unwrap_err();
    assert!(matches!(
        err,
        LifeDbError::Storage(StorageError::NotFound { key: 4242, .. })
    ));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.scan("goals", &ScanRequest::all()).unwrap(), before);
}
