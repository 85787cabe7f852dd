//! Integration tests for routine completion tracking.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use life_db::{
    entities::{life_schema, Routine, RoutineFrequency},
    error::ErrorKind,
    reactive::LiveStore,
    repository::routines::{is_routine_completed_on, log_routine, routines_completed_on},
    storage::MemoryBackend,
    types::RecordKey,
};
use serde_json::json;

fn store() -> LiveStore<MemoryBackend> {
    LiveStore::open(MemoryBackend::new(), &life_schema().unwrap()).unwrap()
}

fn routine(store: &LiveStore<MemoryBackend>, title: &str) -> RecordKey {
    let routine = Routine {
        id: None,
        title: title.into(),
        frequency: RoutineFrequency::Daily,
        active: true,
        description: None,
    };
    store
        .add("routines", serde_json::to_value(routine).unwrap())
        .unwrap()
}

fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn completion_is_scoped_to_the_utc_day() {
    let store = store();
    let stretch = routine(&store, "Stretch");
    let read = routine(&store, "Read");

    log_routine(&store, stretch, utc(2024, 3, 9, 23), None).unwrap();
    log_routine(&store, read, utc(2024, 3, 10, 0), None).unwrap();

    assert_eq!(routines_completed_on(&store, day(2024, 3, 9)).unwrap(), vec![stretch]);
    assert_eq!(routines_completed_on(&store, day(2024, 3, 10)).unwrap(), vec![read]);
    assert!(!is_routine_completed_on(&store, stretch, day(2024, 3, 10)).unwrap());
    assert!(routines_completed_on(&store, day(2024, 3, 11)).unwrap().is_empty());
}

#[test]
fn second_log_on_the_same_day_updates_the_first() {
    let store = store();
    let id = routine(&store, "Stretch");

    let first = log_routine(&store, id, utc(2024, 3, 9, 7), None).unwrap();
    let second = log_routine(&store, id, utc(2024, 3, 9, 21), Some("evening".into())).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.timestamp, utc(2024, 3, 9, 21));
    assert_eq!(second.notes.as_deref(), Some("evening"));
    assert_eq!(store.count("routine_logs").unwrap(), 1);

    log_routine(&store, id, utc(2024, 3, 10, 7), None).unwrap();
    assert_eq!(store.count("routine_logs").unwrap(), 2);
}

#[test]
fn logging_an_unknown_routine_is_not_found() {
    let store = store();
    let err = log_routine(&store, 99, utc(2024, 3, 9, 7), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.count("routine_logs").unwrap(), 0);
}

#[test]
fn incomplete_logs_do_not_count() {
    let store = store();
    let id = routine(&store, "Stretch");
    store
        .add(
            "routine_logs",
            json!({
                "routineId": id,
                "timestamp": utc(2024, 3, 9, 7).timestamp_millis(),
                "completed": false
            }),
        )
        .unwrap();
    assert!(!is_routine_completed_on(&store, id, day(2024, 3, 9)).unwrap());
}
