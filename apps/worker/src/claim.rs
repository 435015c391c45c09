// [apps/worker/src/claim.rs]
//! `findAllClaimableShards`: random window-sampling across every
//! running job's shard space, falling back to a full scan —
//! explicitly including the tail window — after `MaxEmptyWindows`
//! consecutive misses, so shards near the end of a log aren't
//! starved by sampling bias.

use certslurp_domain_models::JobStatus;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::errors::WorkerError;
use crate::state::WorkerState;

/// Width of a sampled window. Small enough that a miss is cheap, large
/// enough that a hit usually yields more than one claimable shard.
const SAMPLE_WINDOW: u64 = 64;

/// Finds up to `batch_size` claimable `(job_id, shard_id)` pairs
/// across every running, non-cancelled job, shuffled so concurrent
/// workers don't all race the same shards in the same order.
pub async fn find_all_claimable_shards(
    state: &WorkerState,
    batch_size: usize,
) -> Result<Vec<(String, u64)>, WorkerError> {
    let jobs = state.jobs.list_jobs().await?;
    let mut candidates = Vec::new();

    for job in jobs {
        if job.status != JobStatus::Running || job.is_cancelled() {
            continue;
        }
        let Some(shard_count) = state.shards.get_shard_count(&job.job_id).await? else {
            continue;
        };
        if shard_count == 0 {
            continue;
        }
        let found = sample_claimable_shards(state, &job.job_id, shard_count, state.config.max_empty_windows).await?;
        candidates.extend(found.into_iter().map(|shard_id| (job.job_id.clone(), shard_id)));
    }

    candidates.shuffle(&mut rand::thread_rng());
    candidates.truncate(batch_size);
    Ok(candidates)
}

async fn sample_claimable_shards(
    state: &WorkerState,
    job_id: &str,
    shard_count: u64,
    max_empty_windows: u32,
) -> Result<Vec<u64>, WorkerError> {
    let window = SAMPLE_WINDOW.min(shard_count).max(1);
    let mut found = Vec::new();
    let mut empty_windows = 0u32;
    let mut rng = rand::thread_rng();

    loop {
        let max_start = shard_count.saturating_sub(window);
        let start = if max_start == 0 { 0 } else { rng.gen_range(0..=max_start) };
        let end = (start + window).min(shard_count);
        let hits = claimable_in_window(state, job_id, start, end).await?;

        let window_covers_whole_job = window >= shard_count;
        if hits.is_empty() {
            empty_windows += 1;
        } else {
            empty_windows = 0;
            found.extend(hits);
        }

        if window_covers_whole_job {
            return Ok(found);
        }
        if empty_windows >= max_empty_windows.max(1) {
            break;
        }
    }

    // Anti-starvation fallback: a full scan that always includes the
    // final window, since tail shards are systematically
    // under-sampled by a purely random window walk. Supersedes
    // whatever the sampled pass already found.
    drop(found);
    claimable_in_window(state, job_id, 0, shard_count).await
}

async fn claimable_in_window(state: &WorkerState, job_id: &str, start: u64, end: u64) -> Result<Vec<u64>, WorkerError> {
    let statuses = state.shards.get_shard_assignments_window(job_id, start, end).await?;
    let now = Utc::now();
    Ok(statuses
        .into_iter()
        .filter(|s| s.assignment.is_claimable(now))
        .map(|s| s.range.shard_id)
        .collect())
}
