// [libs/domain/shard-engine/src/errors.rs]
use certslurp_coordination_store::CoordinationStoreError;
use thiserror::Error;

/// Claim-contention variants (`AssignmentRace`, `AlreadyAssigned`,
/// `InBackoff`) are expected traffic, not errors: they must not be
/// logged as errors, and the supervisor treats them as "skip and try
/// another". Callers should match on these explicitly
/// rather than propagating them with `?` into a log line.
#[derive(Debug, Error)]
pub enum ShardEngineError {
    #[error("[SHD_STORE_FAULT]: coordination store error: {0}")]
    Store(#[from] CoordinationStoreError),

    #[error("[SHD_NOT_FOUND]: no shard range for job {job_id} shard {shard_id}")]
    RangeNotFound { job_id: String, shard_id: u64 },

    #[error("[SHD_ASSIGNMENT_RACE]: shard {job_id}/{shard_id} was claimed by another worker in the same instant")]
    AssignmentRace { job_id: String, shard_id: u64 },

    #[error("[SHD_ALREADY_ASSIGNED]: shard {job_id}/{shard_id} is already held by a live lease")]
    AlreadyAssigned { job_id: String, shard_id: u64 },

    #[error("[SHD_IN_BACKOFF]: shard {job_id}/{shard_id} is backing off until a later retry")]
    InBackoff { job_id: String, shard_id: u64 },

    #[error("[SHD_NOT_HOLDER]: worker {worker_id} is not the current holder of {job_id}/{shard_id}")]
    NotHolder {
        job_id: String,
        shard_id: u64,
        worker_id: String,
    },

    #[error("[SHD_ALREADY_DONE]: shard {job_id}/{shard_id} was already reported done")]
    AlreadyDone { job_id: String, shard_id: u64 },

    #[error("[SHD_COUNT_IMMUTABLE]: shard_count for job {job_id} is already set to {existing}, cannot set to {attempted}")]
    ShardCountImmutable {
        job_id: String,
        existing: u64,
        attempted: u64,
    },
}

impl ShardEngineError {
    /// True for the three claim-contention kinds that are routine, not
    /// failures.
    pub fn is_claim_contention(&self) -> bool {
        matches!(
            self,
            ShardEngineError::AssignmentRace { .. }
                | ShardEngineError::AlreadyAssigned { .. }
                | ShardEngineError::InBackoff { .. }
        )
    }
}
