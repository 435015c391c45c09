// [apps/worker/src/supervisor.rs]
//! The shard-claiming main loop and per-shard processor. The main
//! loop samples claimable shards and spawns a bounded number of
//! processors; each processor claims one shard, drives a
//! producer/consumer ETL pipeline against it, and is guaranteed to
//! report done or failed on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use certslurp_domain_models::{RawLogEntry, ShardRange};
use certslurp_pipeline::{CtLogFetcher, HttpCtLogFetcher, Pipeline};
use certslurp_shard_engine::ShardEngineError;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

use crate::claim;
use crate::errors::WorkerError;
use crate::metrics::jittered;
use crate::state::WorkerState;

/// Claims renew at 1/3 of the shard lease TTL.
const LEASE_RENEW_FRACTION: i64 = 3;
/// Entries fetched per `get-entries` round trip within a shard.
const FETCH_WINDOW: u64 = 1_000;
/// Backoff between claim-contention retries on the same shard.
const CLAIM_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Runs forever, spawning per-shard processors up to `max_parallel`
/// concurrently, until shutdown is signalled. Returns once every
/// in-flight processor it spawned has finished.
pub async fn run(state: Arc<WorkerState>, poll_period: Duration, mut shutdown: watch::Receiver<bool>) {
    let semaphore = Arc::new(Semaphore::new(state.config.max_parallel.max(1) as usize));
    let mut consecutive_errors: u32 = 0;
    let mut in_flight = Vec::new();

    loop {
        if *shutdown.borrow() {
            break;
        }

        match claim::find_all_claimable_shards(&state, state.config.batch_size as usize).await {
            Ok(candidates) => {
                consecutive_errors = 0;
                for (job_id, shard_id) in candidates {
                    if *shutdown.borrow() {
                        break;
                    }
                    let permit = semaphore.clone().acquire_owned().await.expect("semaphore is never closed");
                    let task_state = state.clone();
                    let task_shutdown = shutdown.clone();
                    in_flight.push(tokio::spawn(async move {
                        let _permit = permit;
                        process_shard(task_state, job_id, shard_id, task_shutdown).await;
                    }));
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                error!(error = %e, consecutive_errors, "main loop failed to sample claimable shards");
            }
        }

        in_flight.retain(|h| !h.is_finished());

        let sleep_for = if consecutive_errors >= state.config.main_loop_error_threshold {
            let doubled = poll_period.saturating_mul(1 << consecutive_errors.min(16));
            doubled.min(Duration::from_secs(state.config.max_main_loop_backoff_secs))
        } else {
            jittered(poll_period)
        };

        tokio::select! {
            _ = sleep(sleep_for) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    for handle in in_flight {
        let _ = handle.await;
    }
}

/// Reports `ReportShardFailed` on drop unless explicitly disarmed,
/// covering unrecoverable errors, panics, and any other exit path a
/// processor might take after a successful claim — done or failed
/// must be reported on every exit path, panics included.
struct FailureGuard {
    state: Arc<WorkerState>,
    job_id: String,
    shard_id: u64,
    armed: bool,
}

impl FailureGuard {
    fn new(state: Arc<WorkerState>, job_id: String, shard_id: u64) -> Self {
        FailureGuard { state, job_id, shard_id, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FailureGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let state = self.state.clone();
        let job_id = self.job_id.clone();
        let shard_id = self.shard_id;
        tokio::spawn(async move {
            if let Err(e) = state.shards.report_shard_failed(&job_id, shard_id, &state.worker_id).await {
                error!(job_id = %job_id, shard_id, error = %e, "scope guard could not report shard failure after abnormal exit");
            }
            state.metrics.record_failed();
        });
    }
}

#[instrument(skip(state, shutdown), fields(job_id = %job_id, shard_id))]
async fn process_shard(state: Arc<WorkerState>, job_id: String, shard_id: u64, mut shutdown: watch::Receiver<bool>) {
    let started = Instant::now();
    match try_process_shard(&state, &job_id, shard_id, &mut shutdown).await {
        Ok(true) => {
            state.metrics.record_processed(started.elapsed());
        }
        Ok(false) => {
            // Lost the claim race, the shard no longer exists, or the
            // job was cancelled mid-flight — nothing to report.
        }
        Err(e) => {
            warn!(error = %e, "shard processor exited with an error");
        }
    }
}

/// Returns `Ok(true)` on a completed shard, `Ok(false)` on a
/// no-op exit that needed no failure report, `Err` otherwise (the
/// caller's [`FailureGuard`] will already have reported the failure by
/// the time this returns, since it lives inside this function).
async fn try_process_shard(
    state: &Arc<WorkerState>,
    job_id: &str,
    shard_id: u64,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<bool, WorkerError> {
    if !claim_with_retry(state, job_id, shard_id).await? {
        return Ok(false);
    }

    let mut guard = FailureGuard::new(state.clone(), job_id.to_string(), shard_id);

    let Some(status) = state.shards.get_shard_status(job_id, shard_id).await? else {
        guard.disarm();
        return Ok(false);
    };
    let Some(job) = state.jobs.get_job(job_id).await? else {
        guard.disarm();
        return Ok(false);
    };
    if job.is_cancelled() {
        state.shards.release_shard_lease(job_id, shard_id, &state.worker_id).await?;
        guard.disarm();
        return Ok(false);
    }

    let pipeline = Pipeline::from_names(
        &job.spec.options.output.extractor,
        &job.spec.options.output.transformer,
        &job.spec.options.output.sink,
    )?;

    let fetcher = HttpCtLogFetcher::new(job.spec.log_uri.clone());
    let (tx, rx) = mpsc::channel::<RawLogEntry>(32);

    let lease_secs = state.shards.policy().lease_secs.max(1);
    let renew_period = Duration::from_secs((lease_secs / LEASE_RENEW_FRACTION).max(1) as u64);

    let producer = tokio::spawn(run_producer(fetcher, status.range, tx, shutdown.clone()));

    let renewer_state = state.clone();
    let renewer_job_id = job_id.to_string();
    let renewer = tokio::spawn(run_lease_renewer(renewer_state, renewer_job_id, shard_id, renew_period));

    let consumer_result = pipeline.run(rx).await;
    renewer.abort();
    let producer_result = producer.await;

    let manifest = match (consumer_result, producer_result) {
        (Ok(manifest), Ok(Ok(()))) => manifest,
        (Ok(_), Ok(Err(e))) => return Err(e.into()),
        (Err(e), _) => return Err(e.into()),
        (_, Err(join_err)) => return Err(WorkerError::Producer(join_err.to_string())),
    };

    state.shards.report_shard_done(job_id, shard_id, &state.worker_id, manifest).await?;
    guard.disarm();
    Ok(true)
}

async fn claim_with_retry(state: &Arc<WorkerState>, job_id: &str, shard_id: u64) -> Result<bool, WorkerError> {
    let mut attempt = 0u32;
    loop {
        match state.shards.assign_shard(job_id, shard_id, &state.worker_id).await {
            Ok(_) => return Ok(true),
            Err(ShardEngineError::RangeNotFound { .. }) => return Ok(false),
            Err(e) if e.is_claim_contention() => {
                attempt += 1;
                if attempt >= state.config.max_assign_shard_retries {
                    return Ok(false);
                }
                sleep(CLAIM_RETRY_BACKOFF).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Fetches the shard's range in windows and feeds them to `tx`,
/// closing it (by returning) on completion, fetch error, or shutdown.
async fn run_producer(
    fetcher: HttpCtLogFetcher,
    range: ShardRange,
    tx: mpsc::Sender<RawLogEntry>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), certslurp_pipeline::PipelineError> {
    let mut cursor = range.index_from;
    while cursor < range.index_to {
        if *shutdown.borrow() {
            break;
        }
        let end = (cursor + FETCH_WINDOW).min(range.index_to);
        let entries = fetcher.get_entries(cursor, end).await?;
        if entries.is_empty() {
            break;
        }
        for entry in entries {
            if tx.send(entry).await.is_err() {
                return Ok(()); // consumer side went away
            }
        }
        cursor = end;
    }
    Ok(())
}

/// Renews the shard lease at ≤⅓ TTL while the pipeline is running.
/// Aborted by the caller once the pipeline finishes; a renewal
/// failure (lease lost to an orphan-reclaim race) just stops renewing
/// — the eventual `ReportShardDone`/`ReportShardFailed` call will fail
/// with `NotHolder` and the scope guard logs it.
async fn run_lease_renewer(state: Arc<WorkerState>, job_id: String, shard_id: u64, period: Duration) {
    loop {
        sleep(period).await;
        if let Err(e) = state.shards.renew_shard_lease(&job_id, shard_id, &state.worker_id).await {
            warn!(job_id = %job_id, shard_id, error = %e, "lease renewal failed, giving up on this shard's lease");
            return;
        }
    }
}

