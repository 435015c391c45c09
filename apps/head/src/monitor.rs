// [apps/head/src/monitor.rs]
//! The completion/failure monitor: the only component that ever
//! drives a job out of `running`. Folds shard state into job state
//! and periodically reclaims orphaned shards.

use std::sync::Arc;

use certslurp_domain_models::JobStatus;
use chrono::Utc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, instrument, warn};

use crate::state::AppState;

/// Runs forever. Intended to be spawned once at kernel startup.
pub async fn run(state: AppState, period_secs: u64, orphan_batch_size: u32) {
    let mut tick = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
    loop {
        tick.tick().await;
        if let Err(e) = sweep(&state, orphan_batch_size).await {
            error!(error = %e, "monitor sweep failed, will retry next tick");
        }
    }
}

#[instrument(skip(state))]
async fn sweep(state: &AppState, orphan_batch_size: u32) -> Result<(), crate::errors::ApiError> {
    let jobs = state.jobs.list_jobs().await?;
    for job in jobs {
        if job.status != JobStatus::Running {
            continue;
        }
        if let Err(e) = reclaim_orphans(state, &job.job_id, orphan_batch_size).await {
            warn!(job_id = %job.job_id, error = %e, "orphan reclamation failed for this job");
        }
        if let Err(e) = fold_shard_state(state, &job.job_id).await {
            warn!(job_id = %job.job_id, error = %e, "shard-state fold failed for this job");
        }
    }
    Ok(())
}

async fn reclaim_orphans(state: &AppState, job_id: &str, batch_size: u32) -> Result<(), crate::errors::ApiError> {
    let reclaimed = state.shards.reclaim_orphans(job_id, batch_size as usize).await?;
    if !reclaimed.is_empty() {
        info!(job_id, count = reclaimed.len(), "reclaimed orphaned shard leases");
    }
    Ok(())
}

/// A job with no shards yet (still being sharded by whoever submitted
/// it) is left alone — `shard_count` absent means "not ready to judge".
async fn fold_shard_state(state: &AppState, job_id: &str) -> Result<(), crate::errors::ApiError> {
    let Some(shard_count) = state.shards.get_shard_count(job_id).await? else {
        return Ok(());
    };
    if shard_count == 0 {
        return Ok(());
    }

    let statuses = state.shards.get_shard_assignments(job_id).await?;
    if (statuses.len() as u64) < shard_count {
        return Ok(());
    }

    let max_retries = state.shards.policy().max_retries;
    let all_effectively_done = statuses
        .iter()
        .all(|s| s.assignment.is_effectively_done(max_retries));

    if !all_effectively_done {
        return Ok(()); // some shard is still claimable or in flight
    }

    let any_permanently_failed = statuses
        .iter()
        .any(|s| s.assignment.is_permanently_failed(max_retries));

    if any_permanently_failed {
        info!(job_id, now = %Utc::now(), "driving job to failed: a shard exceeded its retry budget");
        state.jobs.mark_job_failed(job_id).await?;
    } else {
        info!(job_id, now = %Utc::now(), "driving job to completed: every shard is done");
        state.jobs.mark_job_completed(job_id).await?;
    }
    Ok(())
}
