// [libs/domain/shard-engine/tests/lifecycle.rs]
//! Claim contention, permanent-failure, and shard-count-immutability
//! scenarios.

use std::sync::Arc;

use certslurp_coordination_store::{CoordinationStore, MemoryStore};
use certslurp_config::ShardPolicy;
use certslurp_domain_models::{Manifest, ShardRange};
use certslurp_shard_engine::{ShardEngine, ShardEngineError};
use chrono::Utc;

fn engine() -> ShardEngine {
    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    ShardEngine::new(store, "/certslurp", ShardPolicy::default())
}

fn ranges(n: u64, size: u64) -> Vec<ShardRange> {
    (0..n)
        .map(|i| ShardRange {
            shard_id: i,
            index_from: i * size,
            index_to: (i + 1) * size,
        })
        .collect()
}

fn manifest() -> Manifest {
    Manifest {
        record_count: 4,
        byte_count: 128,
        sink_locator: "null://".into(),
        completed_at: Utc::now(),
    }
}

#[tokio::test]
async fn scenario_s2_ten_way_contention_exactly_one_wins() {
    let engine = Arc::new(engine());
    engine.bulk_create_shards("jobA", &ranges(1, 4)).await.unwrap();

    let mut handles = Vec::new();
    for worker in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.assign_shard("jobA", 0, &format!("w{worker}")).await
        }));
    }

    let mut wins = 0;
    let mut contentions = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) if e.is_claim_contention() => contentions += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(contentions, 9);
}

#[tokio::test]
async fn scenario_s4_permanent_failure_then_reset() {
    let engine = engine();
    engine.bulk_create_shards("jobX", &ranges(1, 4)).await.unwrap();
    let policy = ShardPolicy::default();
    assert_eq!(policy.max_retries, 3);

    for attempt in 0..4 {
        engine.assign_shard("jobX", 0, "w1").await.unwrap();
        engine.report_shard_failed("jobX", 0, "w1").await.unwrap();
        let status = engine.get_shard_status("jobX", 0).await.unwrap().unwrap();
        assert_eq!(status.assignment.retries, attempt + 1);
    }

    let status = engine.get_shard_status("jobX", 0).await.unwrap().unwrap();
    assert!(status.assignment.failed);
    assert_eq!(status.assignment.retries, 4);
    assert!(status.assignment.is_permanently_failed(policy.max_retries));
    assert!(!status.assignment.is_claimable(Utc::now()));

    engine.reset_failed_shard("jobX", 0).await.unwrap();
    let status = engine.get_shard_status("jobX", 0).await.unwrap().unwrap();
    assert!(!status.assignment.failed);
    assert_eq!(status.assignment.retries, 0);
    assert!(status.assignment.backoff_until.is_none());
    assert!(status.assignment.is_claimable(Utc::now()));
}

#[tokio::test]
async fn report_shard_failed_below_threshold_backs_off_instead_of_failing() {
    let engine = engine();
    engine.bulk_create_shards("jobY", &ranges(1, 4)).await.unwrap();
    engine.assign_shard("jobY", 0, "w1").await.unwrap();
    engine.report_shard_failed("jobY", 0, "w1").await.unwrap();

    let status = engine.get_shard_status("jobY", 0).await.unwrap().unwrap();
    assert!(!status.assignment.failed);
    assert_eq!(status.assignment.retries, 1);
    assert!(status.assignment.backoff_until.is_some());
    assert!(!status.assignment.is_claimable(Utc::now()));
}

#[tokio::test]
async fn bulk_create_shards_is_idempotent_on_shard_count() {
    let engine = engine();
    engine.bulk_create_shards("jobZ", &ranges(5, 500)).await.unwrap();
    assert_eq!(engine.get_shard_count("jobZ").await.unwrap(), Some(5));

    // Second call with the same ranges must not change shard_count.
    engine.bulk_create_shards("jobZ", &ranges(5, 500)).await.unwrap();
    assert_eq!(engine.get_shard_count("jobZ").await.unwrap(), Some(5));
}

#[tokio::test]
async fn no_double_done() {
    let engine = engine();
    engine.bulk_create_shards("jobD", &ranges(1, 4)).await.unwrap();
    engine.assign_shard("jobD", 0, "w1").await.unwrap();

    engine.report_shard_done("jobD", 0, "w1", manifest()).await.unwrap();
    let second = engine.report_shard_done("jobD", 0, "w1", manifest()).await;
    assert!(matches!(second, Err(ShardEngineError::AlreadyDone { .. })));
}

#[tokio::test]
async fn scenario_s3_orphan_reclaim_after_lease_expiry() {
    let policy = ShardPolicy { lease_secs: 0, ..ShardPolicy::default() };
    let engine = certslurp_shard_engine::ShardEngine::new(
        Arc::new(MemoryStore::new()),
        "/certslurp",
        policy,
    );
    engine.bulk_create_shards("jobO", &ranges(1, 4)).await.unwrap();
    engine.assign_shard("jobO", 0, "worker-a").await.unwrap();

    // lease_secs = 0 means leaseExpiry == assignedAt, already elapsed.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let orphans = engine.find_orphaned_shards("jobO").await.unwrap();
    assert_eq!(orphans, vec![0]);

    let claimed = engine.reassign_orphaned_shards("jobO", "worker-b", 10).await.unwrap();
    assert_eq!(claimed, vec![0]);

    let status = engine.get_shard_status("jobO", 0).await.unwrap().unwrap();
    assert_eq!(status.assignment.worker_id.as_deref(), Some("worker-b"));

    engine.report_shard_done("jobO", 0, "worker-b", manifest()).await.unwrap();
    let status = engine.get_shard_status("jobO", 0).await.unwrap().unwrap();
    assert!(status.assignment.done);
}

#[tokio::test]
async fn renew_lease_requires_current_holder() {
    let engine = engine();
    engine.bulk_create_shards("jobH", &ranges(1, 4)).await.unwrap();
    engine.assign_shard("jobH", 0, "w1").await.unwrap();

    let result = engine.renew_shard_lease("jobH", 0, "w2").await;
    assert!(matches!(result, Err(ShardEngineError::NotHolder { .. })));

    engine.renew_shard_lease("jobH", 0, "w1").await.unwrap();
}
