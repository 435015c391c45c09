// [apps/worker/src/state.rs]
use std::sync::Arc;

use certslurp_config::WorkerRuntimeConfig;
use certslurp_coordination_store::{CoordinationStore, LeaseId};
use certslurp_job_engine::JobEngine;
use certslurp_secrets::SecretsClient;
use certslurp_shard_engine::ShardEngine;

use crate::metrics::WorkerMetricsCounters;

/// Shared state handed to every background loop and per-shard task.
pub struct WorkerState {
    pub store: Arc<dyn CoordinationStore>,
    pub jobs: Arc<JobEngine>,
    pub shards: Arc<ShardEngine>,
    pub secrets_client: Arc<SecretsClient>,
    pub root: String,
    pub worker_id: String,
    pub lease: LeaseId,
    pub metrics: Arc<WorkerMetricsCounters>,
    pub config: WorkerRuntimeConfig,
}
