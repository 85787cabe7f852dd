//! Integration tests for `LiveStore`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use life_db::{
    index::KeyRange,
    query::{IndexQuery, Query},
    reactive::{ChangeEvent, Dependency, LiveStore, Subscription, SubscriptionState},
    schema::{SchemaRegistry, TableDef},
    storage::{MemoryBackend, StorageBackend},
};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .register(
            1,
            vec![
                TableDef::new("actions").index("status"),
                TableDef::new("goals"),
            ],
        )
        .unwrap()
}

fn memory() -> LiveStore<MemoryBackend> {
    LiveStore::open(MemoryBackend::new(), &registry()).unwrap()
}

#[cfg(feature = "sqlite")]
fn sqlite() -> LiveStore<life_db::storage::SqliteBackend> {
    let backend = life_db::storage::SqliteBackend::open_in_memory().unwrap();
    LiveStore::open(backend, &registry()).unwrap()
}

/// A shared call-log for collecting callback invocations.
fn make_log<T: Send + 'static>() -> Arc<Mutex<Vec<T>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn watch_totals<B: StorageBackend + 'static>(
    store: &LiveStore<B>,
    query: Query,
) -> (Subscription, Arc<Mutex<Vec<usize>>>) {
    let log = make_log();
    let l = Arc::clone(&log);
    let sub = store.observe_query("actions", query, move |result| {
        l.lock().unwrap().push(result.expect("query succeeds").total);
    });
    (sub, log)
}

// ============================================================================
// Delivery
// ============================================================================

fn live_query_follows_writes<B: StorageBackend + 'static>(store: LiveStore<B>) {
    let (sub, totals) = watch_totals(
        &store,
        Query::scan(IndexQuery::range("status", KeyRange::only("planned"))),
    );
    assert_eq!(sub.state(), SubscriptionState::Live);

    let key = store.add("actions", json!({"status": "planned"})).unwrap();
    store.add("actions", json!({"status": "done"})).unwrap();
    store.update("actions", key, json!({"status": "done"})).unwrap();
    store.remove("actions", key).unwrap();

    assert_eq!(*totals.lock().unwrap(), vec![0, 1, 1, 0, 0]);
}

#[test]
fn live_query_follows_writes_memory() {
    live_query_follows_writes(memory());
}

#[cfg(feature = "sqlite")]
#[test]
fn live_query_follows_writes_sqlite() {
    live_query_follows_writes(sqlite());
}

#[test]
fn writes_to_other_tables_do_not_wake_subscription() {
    let store = memory();
    let (_sub, totals) = watch_totals(&store, Query::default());
    store.add("goals", json!({})).unwrap();
    store.clear("goals").unwrap();
    assert_eq!(totals.lock().unwrap().len(), 1);
}

#[test]
fn noop_remove_does_not_wake_subscription() {
    let store = memory();
    let (_sub, totals) = watch_totals(&store, Query::default());
    assert!(!store.remove("actions", 77).unwrap());
    assert_eq!(totals.lock().unwrap().len(), 1);
}

#[test]
fn record_subscription_wakes_only_for_its_key() {
    let store = memory();
    let a = store.add("actions", json!({"title": "a"})).unwrap();
    let b = store.add("actions", json!({"title": "b"})).unwrap();

    let seen = make_log();
    let s = Arc::clone(&seen);
    let _sub = store.observe_record("actions", a, move |r| {
        s.lock().unwrap().push(r.unwrap().map(|v| v["title"].clone()));
    });
    store.update("actions", b, json!({"title": "b2"})).unwrap();
    store.update("actions", a, json!({"title": "a2"})).unwrap();
    store.remove("actions", a).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(json!("a")), Some(json!("a2")), None]
    );
}

#[test]
fn general_observe_combines_tables() {
    let store = memory();
    let seen = make_log();
    let s = Arc::clone(&seen);
    let _sub = store.observe(
        vec![Dependency::table("actions"), Dependency::table("goals")],
        |st| Ok(st.count("actions")? + st.count("goals")?),
        move |r| s.lock().unwrap().push(r.unwrap()),
    );
    store.add("actions", json!({})).unwrap();
    store.add("goals", json!({})).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn callback_can_read_the_store() {
    let store = Arc::new(memory());
    let inner = Arc::clone(&store);
    let counts = make_log();
    let c = Arc::clone(&counts);
    let _sub = store.observe_query("actions", Query::default(), move |_| {
        c.lock().unwrap().push(inner.count("actions").unwrap());
    });
    store.add("actions", json!({})).unwrap();
    assert_eq!(*counts.lock().unwrap(), vec![0, 1]);
}

#[test]
fn transaction_delivers_once_after_commit() {
    let store = memory();
    let (_sub, totals) = watch_totals(&store, Query::default());
    store
        .transaction(|tx| {
            tx.add("actions", json!({}))?;
            tx.add("actions", json!({}))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(*totals.lock().unwrap(), vec![0, 2]);
}

// ============================================================================
// Disposal
// ============================================================================

#[test]
fn disposed_subscription_receives_nothing() {
    let store = memory();
    let (sub, totals) = watch_totals(&store, Query::default());
    sub.dispose();
    assert_eq!(sub.state(), SubscriptionState::Disposed);
    store.add("actions", json!({})).unwrap();
    assert_eq!(*totals.lock().unwrap(), vec![0]);
    assert_eq!(store.subscription_count(), 0);
}

#[test]
fn subscription_disposed_during_flush_is_skipped() {
    let store = memory();
    let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&victim);
    let first_calls = counter();
    let fc = Arc::clone(&first_calls);
    let _first = store.observe_query("actions", Query::default(), move |_| {
        if fc.fetch_add(1, Ordering::SeqCst) > 0 {
            if let Some(sub) = slot.lock().unwrap().as_ref() {
                sub.dispose();
            }
        }
    });

    let second_calls = counter();
    let sc = Arc::clone(&second_calls);
    let second = store.observe_query("actions", Query::default(), move |_| {
        sc.fetch_add(1, Ordering::SeqCst);
    });
    *victim.lock().unwrap() = Some(second);

    store.add("actions", json!({})).unwrap();
    assert_eq!(first_calls.load(Ordering::SeqCst), 2);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn result_of_recompute_in_flight_at_disposal_is_discarded() {
    let store = memory();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let armed = Arc::new(AtomicBool::new(false));
    let deliveries = counter();

    let s = Arc::clone(&slot);
    let a = Arc::clone(&armed);
    let d = Arc::clone(&deliveries);
    let sub = store.observe(
        vec![Dependency::table("actions")],
        move |st| {
            if a.load(Ordering::SeqCst) {
                if let Some(sub) = s.lock().unwrap().as_ref() {
                    sub.dispose();
                }
            }
            st.count("actions")
        },
        move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        },
    );
    *slot.lock().unwrap() = Some(sub);

    armed.store(true, Ordering::SeqCst);
    store.add("actions", json!({})).unwrap();
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
    let state = slot.lock().unwrap().as_ref().map(|s| s.state());
    assert_eq!(state, Some(SubscriptionState::Disposed));
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn panicking_callback_does_not_starve_other_subscribers() {
    let store = memory();
    let armed = Arc::new(AtomicBool::new(false));
    let a = Arc::clone(&armed);
    let _bad = store.observe_query("actions", Query::default(), move |_| {
        if a.load(Ordering::SeqCst) {
            panic!("subscriber bug");
        }
    });
    let (_good, totals) = watch_totals(&store, Query::default());

    armed.store(true, Ordering::SeqCst);
    store.add("actions", json!({})).unwrap();
    assert_eq!(*totals.lock().unwrap(), vec![0, 1]);
}

#[test]
fn on_change_reports_every_committed_event() {
    let store = memory();
    let events = make_log();
    let e = Arc::clone(&events);
    let off = store.on_change(move |ev: &ChangeEvent| e.lock().unwrap().push(ev.clone()));

    let key = store.add("actions", json!({})).unwrap();
    store.update("actions", key, json!({"x": 1})).unwrap();
    store.clear("actions").unwrap();
    off();
    store.add("actions", json!({})).unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ChangeEvent::Added {
                table: "actions".into(),
                key
            },
            ChangeEvent::Updated {
                table: "actions".into(),
                key
            },
            ChangeEvent::Cleared {
                table: "actions".into()
            },
        ]
    );
}

#[test]
fn concurrent_writers_are_all_observed() {
    let store = Arc::new(memory());
    let (_sub, totals) = watch_totals(&store, Query::default());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..10 {
                    store.add("actions", json!({})).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.count("actions").unwrap(), 40);
    let totals = totals.lock().unwrap();
    assert_eq!(totals.first(), Some(&0));
    assert!(totals.contains(&40));
}
