// [libs/domain/models/src/keys.rs]
//! Key-path construction for the persistent state layout. Every
//! other crate builds keys through these helpers instead of
//! formatting strings inline, so the layout only has one source of
//! truth.

/// Default root prefix when none is configured.
pub const DEFAULT_ROOT_PREFIX: &str = "/certslurp";

fn trim(prefix: &str) -> &str {
    prefix.trim_end_matches('/')
}

pub fn jobs_prefix(root: &str) -> String {
    format!("{}/jobs/", trim(root))
}

pub fn job_prefix(root: &str, job_id: &str) -> String {
    format!("{}/jobs/{}/", trim(root), job_id)
}

pub fn job_spec_key(root: &str, job_id: &str) -> String {
    format!("{}spec", job_prefix(root, job_id))
}

pub fn job_submitted_key(root: &str, job_id: &str) -> String {
    format!("{}submitted", job_prefix(root, job_id))
}

pub fn job_started_key(root: &str, job_id: &str) -> String {
    format!("{}started", job_prefix(root, job_id))
}

pub fn job_completed_key(root: &str, job_id: &str) -> String {
    format!("{}completed", job_prefix(root, job_id))
}

pub fn job_cancelled_key(root: &str, job_id: &str) -> String {
    format!("{}cancelled", job_prefix(root, job_id))
}

pub fn job_status_key(root: &str, job_id: &str) -> String {
    format!("{}status", job_prefix(root, job_id))
}

pub fn shard_count_key(root: &str, job_id: &str) -> String {
    format!("{}shard_count", job_prefix(root, job_id))
}

pub fn shards_prefix(root: &str, job_id: &str) -> String {
    format!("{}shards/", job_prefix(root, job_id))
}

fn shard_prefix(root: &str, job_id: &str, shard_id: u64) -> String {
    format!("{}{}/", shards_prefix(root, job_id), shard_id)
}

pub fn shard_range_key(root: &str, job_id: &str, shard_id: u64) -> String {
    format!("{}range", shard_prefix(root, job_id, shard_id))
}

pub fn shard_assignment_key(root: &str, job_id: &str, shard_id: u64) -> String {
    format!("{}assignment", shard_prefix(root, job_id, shard_id))
}

pub fn workers_prefix(root: &str) -> String {
    format!("{}/workers/", trim(root))
}

pub fn worker_key(root: &str, worker_id: &str) -> String {
    format!("{}{}", workers_prefix(root), worker_id)
}

fn worker_prefix(root: &str, worker_id: &str) -> String {
    format!("{}/", worker_key(root, worker_id))
}

pub fn worker_last_seen_key(root: &str, worker_id: &str) -> String {
    format!("{}last_seen", worker_prefix(root, worker_id))
}

pub fn worker_shards_processed_key(root: &str, worker_id: &str) -> String {
    format!("{}shards_processed", worker_prefix(root, worker_id))
}

pub fn worker_shards_failed_key(root: &str, worker_id: &str) -> String {
    format!("{}shards_failed", worker_prefix(root, worker_id))
}

pub fn worker_processing_time_ns_key(root: &str, worker_id: &str) -> String {
    format!("{}processing_time_ns", worker_prefix(root, worker_id))
}

pub fn worker_last_updated_key(root: &str, worker_id: &str) -> String {
    format!("{}last_updated", worker_prefix(root, worker_id))
}

pub fn secrets_pending_prefix(root: &str) -> String {
    format!("{}/secrets/pending/", trim(root))
}

pub fn secrets_pending_key(root: &str, node_id: &str) -> String {
    format!("{}{}", secrets_pending_prefix(root), node_id)
}

pub fn secrets_sealed_key_prefix(root: &str) -> String {
    format!("{}/secrets/keys/", trim(root))
}

pub fn secrets_sealed_key(root: &str, node_id: &str) -> String {
    format!("{}{}", secrets_sealed_key_prefix(root), node_id)
}

pub fn secrets_store_prefix(root: &str) -> String {
    format!("{}/secrets/store/", trim(root))
}

pub fn secrets_store_key(root: &str, key: &str) -> String {
    format!("{}{}", secrets_store_prefix(root), key)
}

/// Extracts the `shardID` from a key produced by `shard_prefix`, used
/// when materializing `ShardAssignmentStatus` from a prefix scan.
pub fn parse_shard_id_from_key(root: &str, job_id: &str, key: &str) -> Option<u64> {
    let prefix = shards_prefix(root, job_id);
    let rest = key.strip_prefix(&prefix)?;
    let id_part = rest.split('/').next()?;
    id_part.parse().ok()
}
