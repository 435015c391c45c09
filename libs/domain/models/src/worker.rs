// [libs/domain/models/src/worker.rs]
//! Worker entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The leased `WorkerInfo` record, plus its metric sub-keys. Written
/// and owned by the worker while it heartbeats; all sub-keys share one
/// coordination-store lease so they evaporate together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: String,
    pub host: String,
    pub registered_at: DateTime<Utc>,
}

/// Counters pushed by the worker's metrics loop.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub shards_processed: u64,
    pub shards_failed: u64,
    pub processing_time_ns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub info: WorkerInfo,
    pub last_seen: DateTime<Utc>,
    pub metrics: WorkerMetrics,
    pub last_updated: DateTime<Utc>,
}
