// [apps/head/src/errors.rs]
//! Maps every engine error onto the `{"error": "..."}` envelope and
//! its HTTP status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use certslurp_job_engine::JobEngineError;
use certslurp_secrets::SecretsError;
use certslurp_shard_engine::ShardEngineError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JobEngineError> for ApiError {
    fn from(err: JobEngineError) -> Self {
        match err {
            JobEngineError::InvalidSpec(e) => ApiError::BadRequest(e.to_string()),
            JobEngineError::NotFound(id) => ApiError::NotFound(format!("no job with id {id}")),
            JobEngineError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ShardEngineError> for ApiError {
    fn from(err: ShardEngineError) -> Self {
        if err.is_claim_contention() {
            return ApiError::BadRequest(err.to_string());
        }
        match err {
            ShardEngineError::RangeNotFound { .. } => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<SecretsError> for ApiError {
    fn from(err: SecretsError) -> Self {
        match err {
            SecretsError::NoPendingRegistration(_) => ApiError::NotFound(err.to_string()),
            SecretsError::NotEnrolled => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<certslurp_coordination_store::CoordinationStoreError> for ApiError {
    fn from(err: certslurp_coordination_store::CoordinationStoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
