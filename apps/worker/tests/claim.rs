// [apps/worker/tests/claim.rs]
//! `findAllClaimableShards` window-sampling and full-scan fallback.

use std::sync::Arc;

use certslurp_config::{ShardPolicy, WorkerRuntimeConfig};
use certslurp_coordination_store::{CoordinationStore, MemoryStore};
use certslurp_domain_models::{JobSpec, ShardRange};
use certslurp_job_engine::JobEngine;
use certslurp_secrets::{NodeKeypair, SecretsClient};
use certslurp_shard_engine::ShardEngine;
use certslurp_worker::claim;
use certslurp_worker::metrics::WorkerMetricsCounters;
use certslurp_worker::state::WorkerState;

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

fn job_spec() -> JobSpec {
    serde_json::from_value(serde_json::json!({
        "version": "1",
        "log_uri": "https://ct.example.test/log",
        "options": {
            "fetch": {"fetch_size": 1000, "fetch_workers": 1, "shard_size": 0, "index_start": 0, "index_end": 0},
            "output": {"extractor": "raw", "transformer": "passthrough", "sink": "null"}
        }
    }))
    .unwrap()
}

async fn state() -> Arc<WorkerState> {
    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let root = "/certslurp".to_string();
    let keypair = NodeKeypair::generate();
    let secrets_client = Arc::new(SecretsClient::new(store.clone(), root.clone(), "w1", keypair));
    Arc::new(WorkerState {
        jobs: Arc::new(JobEngine::new(store.clone(), root.clone())),
        shards: Arc::new(ShardEngine::new(store.clone(), root.clone(), ShardPolicy::default())),
        secrets_client,
        root,
        worker_id: "w1".to_string(),
        lease: 0,
        metrics: Arc::new(WorkerMetricsCounters::new()),
        config: worker_config(),
        store,
    })
}

fn ranges(n: u64) -> Vec<ShardRange> {
    (0..n)
        .map(|i| ShardRange { shard_id: i, index_from: i * 1000, index_to: (i + 1) * 1000 })
        .collect()
}

#[tokio::test]
async fn finds_claimable_shards_across_every_running_job() {
    let state = state().await;
    let job_id = state.jobs.submit_job(job_spec()).await.unwrap();
    state.jobs.mark_job_started(&job_id).await.unwrap();
    state.shards.bulk_create_shards(&job_id, &ranges(10)).await.unwrap();

    let found = claim::find_all_claimable_shards(&state, 100).await.unwrap();
    assert_eq!(found.len(), 10);
    assert!(found.iter().all(|(j, _)| j == &job_id));
}

#[tokio::test]
async fn skips_pending_and_cancelled_jobs() {
    let state = state().await;

    let pending_job = state.jobs.submit_job(job_spec()).await.unwrap();
    state.shards.bulk_create_shards(&pending_job, &ranges(3)).await.unwrap();

    let cancelled_job = state.jobs.submit_job(job_spec()).await.unwrap();
    state.jobs.mark_job_started(&cancelled_job).await.unwrap();
    state.shards.bulk_create_shards(&cancelled_job, &ranges(3)).await.unwrap();
    state.jobs.cancel_job(&cancelled_job).await.unwrap();

    let found = claim::find_all_claimable_shards(&state, 100).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn excludes_already_assigned_shards() {
    let state = state().await;
    let job_id = state.jobs.submit_job(job_spec()).await.unwrap();
    state.jobs.mark_job_started(&job_id).await.unwrap();
    state.shards.bulk_create_shards(&job_id, &ranges(5)).await.unwrap();

    state.shards.assign_shard(&job_id, 0, "someone-else").await.unwrap();

    let found = claim::find_all_claimable_shards(&state, 100).await.unwrap();
    assert_eq!(found.len(), 4);
    assert!(!found.iter().any(|(_, shard_id)| *shard_id == 0));
}

#[tokio::test]
async fn batch_size_truncates_the_candidate_list() {
    let state = state().await;
    let job_id = state.jobs.submit_job(job_spec()).await.unwrap();
    state.jobs.mark_job_started(&job_id).await.unwrap();
    state.shards.bulk_create_shards(&job_id, &ranges(50)).await.unwrap();

    let found = claim::find_all_claimable_shards(&state, 7).await.unwrap();
    assert_eq!(found.len(), 7);
}

#[tokio::test]
async fn full_scan_fallback_still_finds_the_tail_shard() {
    // A tiny job where the sampled window always covers the whole
    // space; this exercises the early-return path as well as the
    // fallback, and must never miss shard 0 at the tail.
    let state = state().await;
    let job_id = state.jobs.submit_job(job_spec()).await.unwrap();
    state.jobs.mark_job_started(&job_id).await.unwrap();
    state.shards.bulk_create_shards(&job_id, &ranges(1)).await.unwrap();

    let found = claim::find_all_claimable_shards(&state, 100).await.unwrap();
    assert_eq!(found, vec![(job_id, 0)]);
}
