// [libs/domain/job-engine/src/errors.rs]
use certslurp_coordination_store::CoordinationStoreError;
use certslurp_domain_models::JobSpecValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobEngineError {
    #[error("[JOB_STORE_FAULT]: coordination store error: {0}")]
    Store(#[from] CoordinationStoreError),

    #[error("[JOB_INVALID_SPEC]: {0}")]
    InvalidSpec(#[from] JobSpecValidationError),

    #[error("[JOB_NOT_FOUND]: no job with id {0}")]
    NotFound(String),
}
