// [apps/head/src/handlers/shards.rs]
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use certslurp_domain_models::ShardAssignmentStatus;
use serde::Deserialize;
use tracing::instrument;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ShardWindowQuery {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

#[instrument(skip(state))]
pub async fn list_shards(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(window): Query<ShardWindowQuery>,
) -> Result<Json<Vec<ShardAssignmentStatus>>, ApiError> {
    let statuses = match (window.start, window.end) {
        (Some(start), Some(end)) => state.shards.get_shard_assignments_window(&job_id, start, end).await?,
        _ => state.shards.get_shard_assignments(&job_id).await?,
    };
    Ok(Json(statuses))
}

#[instrument(skip(state))]
pub async fn get_shard(
    State(state): State<AppState>,
    Path((job_id, shard_id)): Path<(String, u64)>,
) -> Result<Json<ShardAssignmentStatus>, ApiError> {
    state
        .shards
        .get_shard_status(&job_id, shard_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no shard {shard_id} for job {job_id}")))
}

#[instrument(skip(state))]
pub async fn reset_failed_shards(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reset = state.shards.reset_failed_shards(&job_id).await?;
    Ok(Json(serde_json::json!({ "reset_shard_ids": reset })))
}

#[instrument(skip(state))]
pub async fn reset_failed_shard(
    State(state): State<AppState>,
    Path((job_id, shard_id)): Path<(String, u64)>,
) -> Result<StatusCode, ApiError> {
    state.shards.reset_failed_shard(&job_id, shard_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
