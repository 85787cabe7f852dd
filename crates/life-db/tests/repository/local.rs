//! Integration tests for `LocalRepository`.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use life_db::{
    entities::{life_schema, Action, ActionStatus, ActionType, Goal, GoalStatus},
    error::ErrorKind,
    reactive::{LiveStore, SubscriptionState},
    repository::{queries::goals_with_status_query, LocalRepository, Repository},
    schema::{SchemaRegistry, TableDef},
    storage::MemoryBackend,
};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn store() -> Arc<LiveStore<MemoryBackend>> {
    Arc::new(LiveStore::open(MemoryBackend::new(), &life_schema().unwrap()).unwrap())
}

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

fn action(title: &str) -> Action {
    Action {
        id: None,
        title: title.into(),
        description: None,
        status: ActionStatus::Planned,
        action_type: ActionType::Task,
        created_at: at(1_000),
        due_date: None,
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
        progress: 0,
        created_at: at(0),
        target_date: None,
        completed_at: (status == GoalStatus::Completed).then(|| at(10)),
        tags: vec![],
    }
}

fn titles<'a>(items: impl IntoIterator<Item = &'a Action>) -> Vec<&'a str> {
    items.into_iter().map(|a| a.title.as_str()).collect()
}

// ============================================================================
// Freshness
// ============================================================================

#[tokio::test]
async fn state_is_loaded_on_construction() {
    let store = store();
    store
        .add("actions", serde_json::to_value(action("seeded")).unwrap())
        .unwrap();

    let repo = LocalRepository::<Action, _>::new(Arc::clone(&store));
    let state = repo.state();
    assert!(!state.is_loading);
    assert!(state.error.is_none());
    assert_eq!(titles(&state.data), vec!["seeded"]);
    assert_eq!(repo.subscription_state(), SubscriptionState::Live);
}

#[tokio::test]
async fn raw_records_with_every_status_decode_into_state() {
    let store = store();
    for status in ["planned", "in-progress", "abandoned"] {
        store
            .add(
                "actions",
                json!({"title": status, "status": status, "type": "habit", "createdAt": 1}),
            )
            .unwrap();
    }

    let repo = LocalRepository::<Action, _>::new(Arc::clone(&store));
    let state = repo.state();
    assert!(state.error.is_none(), "{:?}", state.error);
    let statuses: Vec<ActionStatus> = state.data.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![ActionStatus::Planned, ActionStatus::InProgress, ActionStatus::Abandoned]
    );
    assert!(state.data.iter().all(|a| a.action_type == ActionType::Habit));
}

#[tokio::test]
async fn create_assigns_key_and_state_follows() {
    let repo = LocalRepository::<Action, _>::new(store());
    let created = repo.create(action("Call plumber")).await.unwrap();
    let key = created.id.expect("key assigned");

    let state = repo.state();
    assert_eq!(state.data.len(), 1);
    assert_eq!(state.data[0].id, Some(key));
    assert_eq!(repo.get(key).unwrap(), Some(created));
}

#[tokio::test]
async fn writes_through_another_repository_show_up() {
    let store = store();
    let reader = LocalRepository::<Action, _>::new(Arc::clone(&store));
    let writer = LocalRepository::<Action, _>::new(Arc::clone(&store));

    writer.create(action("a")).await.unwrap();
    writer.create(action("b")).await.unwrap();
    assert_eq!(titles(&reader.state().data), vec!["a", "b"]);
}

#[tokio::test]
async fn listeners_see_every_change() {
    let repo = LocalRepository::<Action, _>::new(store());
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&sizes);
    let off = repo.on_state_change(move |state| s.lock().unwrap().push(state.data.len()));

    let a = repo.create(action("a")).await.unwrap();
    repo.create(action("b")).await.unwrap();
    repo.delete(a.id.unwrap()).await.unwrap();
    off();
    repo.create(action("c")).await.unwrap();

    assert_eq!(*sizes.lock().unwrap(), vec![1, 2, 1]);
}

#[tokio::test]
async fn filtered_view_only_holds_matching_records() {
    let store = store();
    let active = LocalRepository::<Goal, _>::with_query(
        Arc::clone(&store),
        goals_with_status_query(GoalStatus::Active),
    );
    let all = LocalRepository::<Goal, _>::new(Arc::clone(&store));

    let run = all.create(goal("Run", GoalStatus::Active)).await.unwrap();
    all.create(goal("Read", GoalStatus::Paused)).await.unwrap();
    assert_eq!(active.state().data.len(), 1);

    all.update(
        run.id.unwrap(),
        json!({"status": "completed", "completedAt": 20}),
    )
    .await
    .unwrap();
    assert!(active.state().data.is_empty());
    assert_eq!(all.state().data.len(), 2);
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn update_merges_partial_fields() {
    let repo = LocalRepository::<Action, _>::new(store());
    let created = repo.create(action("Call plumber")).await.unwrap();
    let key = created.id.unwrap();

    let updated = repo
        .update(key, json!({"status": "in-progress"}))
        .await
        .unwrap();
    assert_eq!(updated.status, ActionStatus::InProgress);
    assert_eq!(updated.title, "Call plumber");
    assert_eq!(repo.state().data[0].status, ActionStatus::InProgress);
}

#[tokio::test]
async fn invalid_create_is_rejected_and_recorded() {
    let store = store();
    let repo = LocalRepository::<Action, _>::new(Arc::clone(&store));
    repo.create(action("kept")).await.unwrap();

    let err = repo.create(action("  ")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let state = repo.state();
    assert_eq!(state.error.as_ref().map(|e| e.kind), Some(ErrorKind::Validation));
    assert_eq!(titles(&state.data), vec!["kept"]);
    assert_eq!(store.count("actions").unwrap(), 1);
}

#[tokio::test]
async fn update_that_breaks_an_invariant_writes_nothing() {
    let repo = LocalRepository::<Action, _>::new(store());
    let key = repo.create(action("a")).await.unwrap().id.unwrap();

    // completed without completedAt
    let err = repo
        .update(key, json!({"status": "completed"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(repo.get(key).unwrap().unwrap().status, ActionStatus::Planned);
}

#[tokio::test]
async fn update_of_missing_key_is_not_found_and_keeps_data() {
    let repo = LocalRepository::<Action, _>::new(store());
    repo.create(action("a")).await.unwrap();

    let err = repo.update(404, json!({"title": "x"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let state = repo.state();
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::NotFound));
    assert_eq!(titles(&state.data), vec!["a"]);
}

#[tokio::test]
async fn next_successful_load_clears_the_error() {
    let repo = LocalRepository::<Action, _>::new(store());
    repo.update(1, json!({})).await.unwrap_err();
    assert!(repo.state().error.is_some());

    repo.create(action("a")).await.unwrap();
    assert!(repo.state().error.is_none());
}

#[tokio::test]
async fn undeclared_table_is_reported_as_a_query_error() {
    let registry = SchemaRegistry::new()
        .register(1, vec![TableDef::new("goals")])
        .unwrap();
    let store = Arc::new(LiveStore::open(MemoryBackend::new(), &registry).unwrap());

    let repo = LocalRepository::<Action, _>::new(store);
    let state = repo.state();
    assert!(!state.is_loading);
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::Query));
}

#[tokio::test]
async fn undecodable_record_is_reported_by_the_live_query_and_refresh() {
    let store = store();
    let repo = LocalRepository::<Action, _>::new(Arc::clone(&store));
    repo.create(action("a")).await.unwrap();

    let bad = store
        .add("actions", json!({"title": "b", "status": "banana"}))
        .unwrap();
    let state = repo.state();
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::Internal));
    assert_eq!(titles(&state.data), vec!["a"]);

    let err = repo.refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(repo.state().error.is_some());

    store.remove("actions", bad).unwrap();
    let state = repo.state();
    assert!(state.error.is_none());
    assert_eq!(titles(&state.data), vec!["a"]);
}

#[tokio::test]
async fn delete_of_absent_key_succeeds() {
    let repo = LocalRepository::<Action, _>::new(store());
    repo.delete(12).await.unwrap();
    assert!(repo.state().error.is_none());
}

#[tokio::test]
async fn disposed_repository_keeps_last_state() {
    let store = store();
    let repo = LocalRepository::<Action, _>::new(Arc::clone(&store));
    repo.create(action("a")).await.unwrap();
    repo.dispose();
    assert_eq!(repo.subscription_state(), SubscriptionState::Disposed);

    store
        .add("actions", serde_json::to_value(action("b")).unwrap())
        .unwrap();
    assert_eq!(titles(&repo.state().data), vec!["a"]);

    repo.refresh().await.unwrap();
    assert_eq!(titles(&repo.state().data), vec!["a", "b"]);
}
