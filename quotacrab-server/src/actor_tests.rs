#[cfg(test)]
mod tests {
    use crate::actor::AdmissionActor;
    use crate::types::AdmitRequest;
    use quotacrab::{Admission, Decision, MemoryStore, RejectReason, SqliteStore, Store, WindowPolicy};
    use std::sync::Arc;
    use std::time::Duration;

    const WINDOW: Duration = Duration::from_secs(60);

    fn request(key: &str, now: i64) -> AdmitRequest {
        AdmitRequest {
            key: Some(key.to_string()),
            now,
        }
    }

    #[tokio::test]
    async fn test_basic_admission() {
        let store = Arc::new(MemoryStore::new());
        store.create("test", "test", 5, 0).unwrap();
        let handle = AdmissionActor::spawn(4, 100, Admission::new(store, WindowPolicy::new(WINDOW)));

        let decision = handle.admit(request("test", 1)).await.unwrap();
        assert_eq!(
            decision,
            Decision::Admitted {
                limit: 5,
                remaining: 4,
                reset_at: 60_000
            }
        );

        let decision = handle
            .admit(AdmitRequest { key: None, now: 1 })
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::Rejected {
                reason: RejectReason::Unauthenticated,
                reset_at: None
            }
        );
    }

    #[tokio::test]
    async fn test_shard_count_is_at_least_one() {
        let store = Arc::new(MemoryStore::new());
        let handle = AdmissionActor::spawn(0, 10, Admission::new(store, WindowPolicy::new(WINDOW)));
        assert_eq!(handle.shards(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.create("concurrent_test", "concurrent", 10, 0).unwrap();
        let handle = AdmissionActor::spawn(8, 100, Admission::new(store, WindowPolicy::new(WINDOW)));

        // Send multiple concurrent requests
        let mut handles = vec![];
        for _ in 0..25 {
            let h = handle.clone();
            handles.push(tokio::spawn(async move {
                h.admit(request("concurrent_test", 5)).await
            }));
        }

        // Collect results
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap().unwrap().is_admitted() {
                admitted += 1;
            }
        }

        // Should admit exactly the limit
        assert_eq!(admitted, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_keys_are_independent_across_shards() {
        let store = Arc::new(MemoryStore::new());
        let keys: Vec<String> = (0..16).map(|i| format!("key_{i}")).collect();
        for key in &keys {
            store.create(key, key, 3, 0).unwrap();
        }
        let handle = AdmissionActor::spawn(
            4,
            100,
            Admission::new(Arc::clone(&store), WindowPolicy::new(WINDOW)),
        );

        let mut tasks = vec![];
        for key in &keys {
            for _ in 0..5 {
                let h = handle.clone();
                let key = key.clone();
                tasks.push(tokio::spawn(async move { h.admit(request(&key, 1)).await }));
            }
        }
        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_admitted() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, keys.len() * 3);
        for key in &keys {
            assert_eq!(store.get(key).unwrap().count, 3);
        }
    }
}
