//! Test suite run against every store implementation

use super::{MemoryStore, SqliteStore, Store, StoreError};
use crate::core::credential::FieldUpdate;
use crate::core::window::WindowPolicy;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const W: Duration = Duration::from_millis(1_000);

/// Macro to test all stores with a given test function
macro_rules! test_all_stores {
    ($test_fn:expr) => {
        $test_fn("Memory", &MemoryStore::with_capacity(100));
        $test_fn("Sqlite", &SqliteStore::open_in_memory().unwrap());
    };
}

#[test]
fn test_create_and_get() {
    let test_fn = |name: &str, store: &dyn Store| {
        let created = store.create("key1", "alpha", 5, 1_000).unwrap();
        let fetched = store.get("key1").unwrap();

        assert_eq!(created, fetched, "{name}: fetched record differs");
        assert_eq!(fetched.count, 0, "{name}");
        assert_eq!(fetched.window_start, 1_000, "{name}");
        assert_eq!(store.get("missing"), Err(StoreError::NotFound), "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_duplicate_name_leaves_one_record() {
    let test_fn = |name: &str, store: &dyn Store| {
        store.create("key1", "alpha", 5, 0).unwrap();

        let err = store.create("key2", "alpha", 9, 10).unwrap_err();
        assert_eq!(err, StoreError::DuplicateName("alpha".into()), "{name}");

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1, "{name}");
        assert_eq!(all[0].key, "key1", "{name}");
        assert_eq!(all[0].limit, 5, "{name}");
        assert_eq!(store.get("key2"), Err(StoreError::NotFound), "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_duplicate_key() {
    let test_fn = |name: &str, store: &dyn Store| {
        store.create("key1", "alpha", 5, 0).unwrap();
        let err = store.create("key1", "beta", 5, 0).unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey, "{name}");
        assert_eq!(store.get("key1").unwrap().name, "alpha", "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_create_validates_inputs() {
    let test_fn = |name: &str, store: &dyn Store| {
        assert!(
            matches!(store.create("k", "n", 0, 0), Err(StoreError::InvalidValue(_))),
            "{name}"
        );
        assert!(
            matches!(store.create("k", "  ", 1, 0), Err(StoreError::InvalidValue(_))),
            "{name}"
        );
        assert!(store.list().unwrap().is_empty(), "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_update_limit_is_isolated() {
    let test_fn = |name: &str, store: &dyn Store| {
        let policy = WindowPolicy::new(W);
        store.create("a", "alpha", 5, 0).unwrap();
        store.create("b", "beta", 5, 0).unwrap();
        store.cas_increment_or_reset("a", 10, &policy).unwrap();
        store.cas_increment_or_reset("b", 20, &policy).unwrap();
        store.cas_increment_or_reset("b", 21, &policy).unwrap();

        let before_a = store.get("a").unwrap();
        let before_b = store.get("b").unwrap();

        store.update_field("a", &FieldUpdate::Limit(50)).unwrap();

        let after_a = store.get("a").unwrap();
        assert_eq!(after_a.limit, 50, "{name}");
        assert_eq!(after_a.count, before_a.count, "{name}");
        assert_eq!(after_a.window_start, before_a.window_start, "{name}");
        assert_eq!(after_a.name, before_a.name, "{name}");
        assert_eq!(store.get("b").unwrap(), before_b, "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_rename() {
    let test_fn = |name: &str, store: &dyn Store| {
        store.create("a", "alpha", 5, 0).unwrap();
        store.create("b", "beta", 5, 0).unwrap();

        // Collision fails without mutation
        let err = store
            .update_field("a", &FieldUpdate::Name("beta".into()))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateName("beta".into()), "{name}");
        assert_eq!(store.get("a").unwrap().name, "alpha", "{name}");

        // Renaming to its own name is a no-op
        store
            .update_field("a", &FieldUpdate::Name("alpha".into()))
            .unwrap();

        store
            .update_field("a", &FieldUpdate::Name("gamma".into()))
            .unwrap();
        assert_eq!(store.get("a").unwrap().name, "gamma", "{name}");

        // The old name is free again
        store.create("c", "alpha", 1, 0).unwrap();
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_update_errors() {
    let test_fn = |name: &str, store: &dyn Store| {
        store.create("a", "alpha", 5, 0).unwrap();

        assert_eq!(
            store.update_field("missing", &FieldUpdate::Limit(3)),
            Err(StoreError::NotFound),
            "{name}"
        );
        assert!(
            matches!(
                store.update_field("a", &FieldUpdate::Limit(0)),
                Err(StoreError::InvalidValue(_))
            ),
            "{name}"
        );
        assert_eq!(store.get("a").unwrap().limit, 5, "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_cas_window_rollover() {
    let test_fn = |name: &str, store: &dyn Store| {
        let policy = WindowPolicy::new(W);
        let t0 = 10_000;
        store.create("k", "rollover", 2, t0).unwrap();

        assert!(store.cas_increment_or_reset("k", t0 + 1, &policy).unwrap().admitted, "{name}");
        assert!(store.cas_increment_or_reset("k", t0 + 1, &policy).unwrap().admitted, "{name}");

        let rejected = store.cas_increment_or_reset("k", t0 + 2, &policy).unwrap();
        assert!(!rejected.admitted, "{name}");
        assert_eq!(rejected.count, 2, "{name}");
        assert_eq!(rejected.window_start, t0, "{name}");

        let later = t0 + 1_000 + 1;
        let outcome = store.cas_increment_or_reset("k", later, &policy).unwrap();
        assert!(outcome.admitted, "{name}");
        assert_eq!(outcome.count, 1, "{name}");
        assert_eq!(outcome.window_start, later, "{name}");

        let stored = store.get("k").unwrap();
        assert_eq!(stored.count, 1, "{name}");
        assert_eq!(stored.window_start, later, "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_cas_unknown_key() {
    let test_fn = |name: &str, store: &dyn Store| {
        let policy = WindowPolicy::new(W);
        assert_eq!(
            store.cas_increment_or_reset("nope", 0, &policy),
            Err(StoreError::NotFound),
            "{name}"
        );
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_delete_expired_affects_only_stale() {
    let test_fn = |name: &str, store: &dyn Store| {
        let policy = WindowPolicy::new(W);
        let now = 100_000;

        // 7 credentials, 3 of them stale at `now`
        for i in 0..7 {
            let window_start = if i < 3 { now - 5_000 } else { now - 500 };
            store
                .create(&format!("k{i}"), &format!("n{i}"), 10, window_start)
                .unwrap();
            store
                .cas_increment_or_reset(&format!("k{i}"), window_start, &policy)
                .unwrap();
        }
        let fresh_before: Vec<_> = (3..7)
            .map(|i| store.get(&format!("k{i}")).unwrap())
            .collect();

        assert_eq!(store.delete_expired(now, &policy).unwrap(), 3, "{name}");

        for i in 0..3 {
            let credential = store.get(&format!("k{i}")).unwrap();
            assert_eq!(credential.count, 0, "{name}");
            assert_eq!(credential.window_start, now, "{name}");
        }
        for (i, before) in (3..7).zip(fresh_before) {
            assert_eq!(store.get(&format!("k{i}")).unwrap(), before, "{name}");
        }

        // Nothing is stale any more
        assert_eq!(store.delete_expired(now, &policy).unwrap(), 0, "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_list_delete_clear() {
    let test_fn = |name: &str, store: &dyn Store| {
        store.create("b", "second", 1, 20).unwrap();
        store.create("a", "first", 1, 10).unwrap();
        store.create("c", "third", 1, 30).unwrap();

        let keys: Vec<_> = store.list().unwrap().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"], "{name}");

        store.delete("b").unwrap();
        assert_eq!(store.delete("b"), Err(StoreError::NotFound), "{name}");
        assert_eq!(store.list().unwrap().len(), 2, "{name}");

        // Name of a deleted credential can be reused
        store.create("d", "second", 1, 40).unwrap();

        assert_eq!(store.clear().unwrap(), 3, "{name}");
        assert!(store.list().unwrap().is_empty(), "{name}");
    };
    test_all_stores!(test_fn);
}

#[test]
fn test_concurrent_cas_never_exceeds_limit() {
    fn run<S: Store + 'static>(name: &str, store: S) {
        let policy = WindowPolicy::new(Duration::from_secs(60));
        let limit = 25;
        store.create("hot", "hot", limit, 0).unwrap();
        store.create("cold", "cold", limit, 0).unwrap();

        let store = Arc::new(store);
        let admitted = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for t in 0..8 {
                let store = Arc::clone(&store);
                let admitted = Arc::clone(&admitted);
                scope.spawn(move || {
                    for _ in 0..20 {
                        let key = if t % 4 == 3 { "cold" } else { "hot" };
                        let outcome = store.cas_increment_or_reset(key, 1, &policy).unwrap();
                        if key == "hot" && outcome.admitted {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), limit as usize, "{name}");
        assert_eq!(store.get("hot").unwrap().count, limit, "{name}");
        assert_eq!(store.get("cold").unwrap().count, limit, "{name}");
    }

    run("Memory", MemoryStore::new());
    run("Sqlite", SqliteStore::open_in_memory().unwrap());
}
