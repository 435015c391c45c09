// [apps/worker/src/errors.rs]
use certslurp_coordination_store::CoordinationStoreError;
use certslurp_job_engine::JobEngineError;
use certslurp_pipeline::PipelineError;
use certslurp_secrets::SecretsError;
use certslurp_shard_engine::ShardEngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("[WRK_STORE_FAULT]: {0}")]
    Store(#[from] CoordinationStoreError),

    #[error("[WRK_JOB_FAULT]: {0}")]
    Job(#[from] JobEngineError),

    #[error("[WRK_SHARD_FAULT]: {0}")]
    Shard(#[from] ShardEngineError),

    #[error("[WRK_PIPELINE_FAULT]: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("[WRK_SECRETS_FAULT]: {0}")]
    Secrets(#[from] SecretsError),

    #[error("[WRK_PRODUCER_FAULT]: producer task did not exit cleanly: {0}")]
    Producer(String),
}
