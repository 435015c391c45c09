// [libs/infra/coordination-store/src/lib.rs]
//! Coordination-store abstraction: the only primitives the job
//! engine, shard engine and secret store depend on. A real
//! deployment binds this to an etcd v3 cluster; tests bind it to an
//! in-process double. Nothing above this crate imports `etcd_client`.

pub mod errors;
pub mod etcd_store;
pub mod memory_store;
pub mod store;
pub mod types;

pub use errors::CoordinationStoreError;
pub use etcd_store::EtcdStore;
pub use memory_store::MemoryStore;
pub use store::{CoordinationStore, WatchStream};
pub use types::{to_json_bytes, KeyValue, LeaseId, Predicate, TxnOp, TxnResult, WatchEvent};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        n: u32,
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("/certslurp/a", to_json_bytes(&Sample { n: 1 }), None)
            .await
            .unwrap();
        let kv = store.get("/certslurp/a").await.unwrap().unwrap();
        assert_eq!(kv.json::<Sample>().unwrap(), Sample { n: 1 });
    }

    #[tokio::test]
    async fn list_respects_prefix() {
        let store = MemoryStore::new();
        store.put("/certslurp/jobs/a", b"1".to_vec(), None).await.unwrap();
        store.put("/certslurp/jobs/b", b"2".to_vec(), None).await.unwrap();
        store.put("/certslurp/workers/c", b"3".to_vec(), None).await.unwrap();

        let jobs = store.list("/certslurp/jobs/").await.unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[tokio::test]
    async fn txn_create_if_absent_is_exclusive() {
        let store = MemoryStore::new();
        let key = "/certslurp/jobs/x/shard_count".to_string();

        let first = store
            .txn(
                vec![Predicate::KeyAbsent { key: key.clone() }],
                vec![TxnOp::put(key.clone(), b"5".to_vec())],
                vec![],
            )
            .await
            .unwrap();
        assert!(first.succeeded);

        let second = store
            .txn(
                vec![Predicate::KeyAbsent { key: key.clone() }],
                vec![TxnOp::put(key.clone(), b"9".to_vec())],
                vec![],
            )
            .await
            .unwrap();
        assert!(!second.succeeded);

        let kv = store.get(&key).await.unwrap().unwrap();
        assert_eq!(kv.value, b"5".to_vec());
    }

    #[tokio::test]
    async fn concurrent_mod_revision_cas_admits_exactly_one_winner() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let key = "/certslurp/jobs/x/shards/0/assignment".to_string();
        store.put(&key, b"{}".to_vec(), None).await.unwrap();
        let seen = store.get(&key).await.unwrap().unwrap();

        let mut handles = Vec::new();
        for worker in 0..10 {
            let store = store.clone();
            let key = key.clone();
            let revision = seen.mod_revision;
            handles.push(tokio::spawn(async move {
                store
                    .txn(
                        vec![Predicate::ModRevisionEquals { key: key.clone(), revision }],
                        vec![TxnOp::put(key, format!("worker-{worker}").into_bytes())],
                        vec![],
                    )
                    .await
                    .unwrap()
                    .succeeded
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn revoke_deletes_leased_keys() {
        let store = MemoryStore::new();
        let lease = store.grant_lease(60).await.unwrap();
        store
            .put("/certslurp/workers/w1", b"{}".to_vec(), Some(lease))
            .await
            .unwrap();
        store
            .put("/certslurp/workers/w1/last_seen", b"now".to_vec(), Some(lease))
            .await
            .unwrap();

        store.revoke(lease).await.unwrap();

        assert!(store.get("/certslurp/workers/w1").await.unwrap().is_none());
        assert!(store
            .get("/certslurp/workers/w1/last_seen")
            .await
            .unwrap()
            .is_none());
    }
}
