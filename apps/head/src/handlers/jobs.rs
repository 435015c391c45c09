// [apps/head/src/handlers/jobs.rs]
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use certslurp_config::{effective_shard_size, plan_shards};
use certslurp_domain_models::{JobInfo, JobSpec, JobStatus, ShardRange};
use certslurp_pipeline::{CtLogFetcher, HttpCtLogFetcher};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::errors::ApiError;
use crate::state::AppState;

/// Resolves `index_end` (fetching the log's current tree size when
/// the job spec leaves it at 0), plans
/// shard ranges, and bulk-creates them. Shard creation failing after
/// the job record is written just leaves the job stuck at `pending`
/// with zero shards — the monitor leaves those alone (`apps/head/src/monitor.rs`)
/// and resubmission of the same spec is the operator's recourse.
#[instrument(skip(state, spec))]
async fn shard_job(state: &AppState, job_id: &str, spec: &JobSpec) -> Result<u64, ApiError> {
    let index_start = spec.options.fetch.index_start;
    let index_end = if spec.options.fetch.index_end > 0 {
        spec.options.fetch.index_end
    } else {
        let fetcher = HttpCtLogFetcher::new(spec.log_uri.clone());
        let sth = fetcher
            .get_sth()
            .await
            .map_err(|e| ApiError::Internal(format!("could not resolve tree size for {}: {e}", spec.log_uri)))?;
        sth.tree_size
    };

    if index_end <= index_start {
        warn!(job_id, index_start, index_end, "resolved empty index range, no shards created");
        return Ok(0);
    }

    let shard_size = effective_shard_size(spec.options.fetch.shard_size, index_end - index_start);
    let ranges: Vec<ShardRange> = plan_shards(index_start, index_end, shard_size)
        .into_iter()
        .enumerate()
        .map(|(shard_id, (from, to))| ShardRange {
            shard_id: shard_id as u64,
            index_from: from,
            index_to: to,
        })
        .collect();

    let shard_count = ranges.len() as u64;
    state.shards.bulk_create_shards(job_id, &ranges).await?;
    Ok(shard_count)
}

#[instrument(skip(state, spec))]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(spec): Json<JobSpec>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let job_id = state.jobs.submit_job(spec.clone()).await?;
    let shard_count = shard_job(&state, &job_id, &spec).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "job_id": job_id, "shard_count": shard_count })),
    ))
}

#[instrument(skip(state))]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobInfo>>, ApiError> {
    Ok(Json(state.jobs.list_jobs().await?))
}

#[instrument(skip(state))]
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Json<JobInfo>, ApiError> {
    state
        .jobs
        .get_job(&job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no job with id {job_id}")))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: JobStatus,
}

#[instrument(skip(state, payload))]
pub async fn update_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<StatusCode, ApiError> {
    state.jobs.update_job_status(&job_id, payload.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn start_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<StatusCode, ApiError> {
    state.jobs.mark_job_started(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn complete_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<StatusCode, ApiError> {
    state.jobs.mark_job_completed(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn cancel_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<StatusCode, ApiError> {
    state.jobs.cancel_job(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
