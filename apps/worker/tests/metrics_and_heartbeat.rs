// [apps/worker/tests/metrics_and_heartbeat.rs]
//! The metrics push transaction and the lease keep-alive loop.

use std::sync::Arc;
use std::time::Duration;

use certslurp_config::{ShardPolicy, WorkerRuntimeConfig};
use certslurp_coordination_store::{CoordinationStore, MemoryStore};
use certslurp_domain_models::keys;
use certslurp_job_engine::JobEngine;
use certslurp_secrets::{NodeKeypair, SecretsClient};
use certslurp_shard_engine::ShardEngine;
use certslurp_worker::metrics::{self, WorkerMetricsCounters};
use certslurp_worker::state::WorkerState;
use tokio::sync::watch;

fn worker_config() -> WorkerRuntimeConfig {
    WorkerRuntimeConfig {
        parallelism: 1,
        batch_size: 8,
        poll_period_secs: 1,
        max_parallel: 4,
        max_empty_windows: 3,
        max_assign_shard_retries: 5,
        main_loop_error_threshold: 5,
        max_main_loop_backoff_secs: 120,
    }
}

async fn state_with_lease() -> Arc<WorkerState> {
    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let root = "/certslurp".to_string();
    let lease = store.grant_lease(60).await.unwrap();
    let keypair = NodeKeypair::generate();
    let secrets_client = Arc::new(SecretsClient::new(store.clone(), root.clone(), "w1", keypair));
    Arc::new(WorkerState {
        jobs: Arc::new(JobEngine::new(store.clone(), root.clone())),
        shards: Arc::new(ShardEngine::new(store.clone(), root.clone(), ShardPolicy::default())),
        secrets_client,
        root,
        worker_id: "w1".to_string(),
        lease,
        metrics: Arc::new(WorkerMetricsCounters::new()),
        config: worker_config(),
        store,
    })
}

#[tokio::test]
async fn metrics_run_pushes_counters_tied_to_the_worker_lease_before_shutdown() {
    let state = state_with_lease().await;
    state.metrics.record_processed(Duration::from_millis(5));
    state.metrics.record_processed(Duration::from_millis(7));
    state.metrics.record_failed();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(metrics::run(state.clone(), Duration::from_secs(3600), rx));

    // Give the spawned task a chance to start waiting on its select
    // before signalling shutdown, which triggers one final push.
    tokio::task::yield_now().await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let processed = state
        .store
        .get(&keys::worker_shards_processed_key(&state.root, &state.worker_id))
        .await
        .unwrap()
        .expect("shards_processed key must exist after a push");
    let count: u64 = processed.json().unwrap();
    assert_eq!(count, 2);

    let failed = state
        .store
        .get(&keys::worker_shards_failed_key(&state.root, &state.worker_id))
        .await
        .unwrap()
        .expect("shards_failed key must exist after a push");
    let count: u64 = failed.json().unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn heartbeat_run_exits_cleanly_on_shutdown() {
    let state = state_with_lease().await;
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(certslurp_worker::heartbeat::run(state, Duration::from_secs(3600), rx));

    tokio::task::yield_now().await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("heartbeat loop must exit promptly once shutdown is signalled")
        .unwrap();
}

#[test]
fn jittered_stays_within_twenty_percent_of_the_requested_period() {
    let period = Duration::from_secs(10);
    for _ in 0..100 {
        let got = metrics::jittered(period);
        assert!(got >= Duration::from_millis(7_900));
        assert!(got <= Duration::from_millis(12_100));
    }
}
