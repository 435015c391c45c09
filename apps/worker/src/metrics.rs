// [apps/worker/src/metrics.rs]
//! Atomic shard-processing counters and their periodic push to the
//! coordination store. Counters are manipulated only with atomic
//! arithmetic, never a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use certslurp_coordination_store::{to_json_bytes, TxnOp};
use certslurp_domain_models::{keys, WorkerMetrics};
use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tracing::{error, instrument};

use crate::state::WorkerState;

#[derive(Default)]
pub struct WorkerMetricsCounters {
    pub shards_processed: AtomicU64,
    pub shards_failed: AtomicU64,
    pub processing_time_ns: AtomicU64,
}

impl WorkerMetricsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self, elapsed: Duration) {
        self.shards_processed.fetch_add(1, Ordering::Relaxed);
        self.processing_time_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.shards_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerMetrics {
        WorkerMetrics {
            shards_processed: self.shards_processed.load(Ordering::Relaxed),
            shards_failed: self.shards_failed.load(Ordering::Relaxed),
            processing_time_ns: self.processing_time_ns.load(Ordering::Relaxed),
        }
    }
}

/// Pushes the counters (plus `last_seen`/`last_updated`) every
/// `period` ± jitter, as one atomic transaction sharing the worker's
/// lease, until shutdown is signalled.
pub async fn run(state: Arc<WorkerState>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(jittered(period)) => {
                if let Err(e) = push_once(&state).await {
                    error!(error = %e, "metrics push failed, will retry next tick");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = push_once(&state).await;
                    return;
                }
            }
        }
    }
}

#[instrument(skip(state))]
async fn push_once(state: &WorkerState) -> Result<(), certslurp_coordination_store::CoordinationStoreError> {
    let snapshot = state.metrics.snapshot();
    let now = Utc::now();
    let ops = vec![
        TxnOp::put_leased(keys::worker_last_seen_key(&state.root, &state.worker_id), to_json_bytes(&now), state.lease),
        TxnOp::put_leased(
            keys::worker_shards_processed_key(&state.root, &state.worker_id),
            to_json_bytes(&snapshot.shards_processed),
            state.lease,
        ),
        TxnOp::put_leased(
            keys::worker_shards_failed_key(&state.root, &state.worker_id),
            to_json_bytes(&snapshot.shards_failed),
            state.lease,
        ),
        TxnOp::put_leased(
            keys::worker_processing_time_ns_key(&state.root, &state.worker_id),
            to_json_bytes(&snapshot.processing_time_ns),
            state.lease,
        ),
        TxnOp::put_leased(keys::worker_last_updated_key(&state.root, &state.worker_id), to_json_bytes(&now), state.lease),
    ];
    state.store.txn(vec![], ops, vec![]).await?;
    Ok(())
}

/// ± 20% jitter so many workers' pushes/heartbeats don't phase-lock.
pub fn jittered(period: Duration) -> Duration {
    let millis = period.as_millis().max(1) as i64;
    let spread = millis / 5;
    let delta = rand::thread_rng().gen_range(-spread..=spread);
    Duration::from_millis((millis + delta).max(1) as u64)
}
