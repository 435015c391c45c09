// [libs/domain/job-engine/tests/lifecycle.rs]
//! `pending → running → (completed | failed | cancelled)` transitions
//! and cancellation visibility.

use std::collections::HashMap;
use std::sync::Arc;

use certslurp_coordination_store::{CoordinationStore, MemoryStore};
use certslurp_domain_models::{FetchOptions, JobOptions, JobSpec, JobStatus, MatchOptions, OutputOptions};
use certslurp_job_engine::{JobEngine, JobEngineError};

fn engine() -> JobEngine {
    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    JobEngine::new(store, "/certslurp")
}

fn sample_spec() -> JobSpec {
    JobSpec {
        version: "0.1.0".into(),
        note: Some("test job".into()),
        log_uri: "https://ct.example/log".into(),
        options: JobOptions {
            fetch: FetchOptions {
                fetch_size: 256,
                fetch_workers: 4,
                shard_size: 0,
                index_start: 0,
                index_end: 2500,
            },
            r#match: MatchOptions::default(),
            output: OutputOptions {
                chunk_records: None,
                chunk_bytes: None,
                extractor: "raw".into(),
                extractor_options: HashMap::new(),
                transformer: "passthrough".into(),
                transformer_options: HashMap::new(),
                sink: "null".into(),
                sink_options: HashMap::new(),
            },
        },
    }
}

#[tokio::test]
async fn submit_then_get_round_trips_the_spec() {
    let engine = engine();
    let job_id = engine.submit_job(sample_spec()).await.unwrap();

    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.spec.log_uri, "https://ct.example/log");
    assert!(job.started.is_none());
    assert!(job.completed.is_none());
    assert!(job.cancelled.is_none());
}

#[tokio::test]
async fn invalid_spec_is_rejected_before_anything_is_written() {
    let engine = engine();
    let mut spec = sample_spec();
    spec.log_uri = String::new();

    let result = engine.submit_job(spec).await;
    assert!(matches!(result, Err(JobEngineError::InvalidSpec(_))));
    assert!(engine.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn happy_path_runs_to_completion() {
    let engine = engine();
    let job_id = engine.submit_job(sample_spec()).await.unwrap();

    engine.mark_job_started(&job_id).await.unwrap();
    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.started.is_some());

    engine.mark_job_completed(&job_id).await.unwrap();
    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed.is_some());
    assert!(job.status.is_terminal());
}

#[tokio::test]
async fn a_permanently_failed_shard_set_drives_the_job_to_failed() {
    let engine = engine();
    let job_id = engine.submit_job(sample_spec()).await.unwrap();
    engine.mark_job_started(&job_id).await.unwrap();

    engine.mark_job_failed(&job_id).await.unwrap();
    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.completed.is_some());
}

#[tokio::test]
async fn cancellation_is_reachable_from_pending_and_running() {
    let engine = engine();

    let pending_job = engine.submit_job(sample_spec()).await.unwrap();
    engine.cancel_job(&pending_job).await.unwrap();
    assert!(engine.is_job_cancelled(&pending_job).await.unwrap());
    let job = engine.get_job(&pending_job).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);

    let running_job = engine.submit_job(sample_spec()).await.unwrap();
    engine.mark_job_started(&running_job).await.unwrap();
    engine.cancel_job(&running_job).await.unwrap();
    assert!(engine.is_job_cancelled(&running_job).await.unwrap());
}

#[tokio::test]
async fn cancellation_is_visible_before_the_status_write_observer_would_poll_it() {
    // Property 7: IsJobCancelled is a direct presence check, independent
    // of whatever UpdateJobStatus/MarkJob* call last ran.
    let engine = engine();
    let job_id = engine.submit_job(sample_spec()).await.unwrap();
    assert!(!engine.is_job_cancelled(&job_id).await.unwrap());

    engine.cancel_job(&job_id).await.unwrap();
    assert!(engine.is_job_cancelled(&job_id).await.unwrap());
}

#[tokio::test]
async fn list_jobs_returns_every_submitted_job() {
    let engine = engine();
    let a = engine.submit_job(sample_spec()).await.unwrap();
    let b = engine.submit_job(sample_spec()).await.unwrap();

    let jobs = engine.list_jobs().await.unwrap();
    let ids: Vec<_> = jobs.iter().map(|j| j.job_id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a));
    assert!(ids.contains(&b));
}

#[tokio::test]
async fn operating_on_an_unknown_job_id_returns_not_found() {
    let engine = engine();
    let result = engine.mark_job_started("does-not-exist").await;
    assert!(matches!(result, Err(JobEngineError::NotFound(_))));
}

#[tokio::test]
async fn get_job_returns_none_for_unknown_id() {
    let engine = engine();
    assert!(engine.get_job("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn update_job_status_writes_an_arbitrary_transition() {
    let engine = engine();
    let job_id = engine.submit_job(sample_spec()).await.unwrap();

    engine.update_job_status(&job_id, JobStatus::Running).await.unwrap();
    let job = engine.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
}
