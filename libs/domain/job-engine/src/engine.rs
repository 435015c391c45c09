// [libs/domain/job-engine/src/engine.rs]
//! Job submission and the `pending → running → (completed | failed |
//! cancelled)` state machine.

use std::sync::Arc;

use certslurp_coordination_store::{to_json_bytes, CoordinationStore, Predicate, TxnOp};
use certslurp_domain_models::keys;
use certslurp_domain_models::{JobInfo, JobSpec, JobStatus};
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::JobEngineError;

pub struct JobEngine {
    store: Arc<dyn CoordinationStore>,
    root: String,
}

impl JobEngine {
    pub fn new(store: Arc<dyn CoordinationStore>, root: impl Into<String>) -> Self {
        JobEngine { store, root: root.into() }
    }

    /// Validates `spec`, assigns a fresh UUID, and atomically writes
    /// `spec`, `submitted=now`, `status=pending`.
    #[instrument(skip(self, spec))]
    pub async fn submit_job(&self, spec: JobSpec) -> Result<String, JobEngineError> {
        spec.validate()?;

        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let spec_key = keys::job_spec_key(&self.root, &job_id);
        let submitted_key = keys::job_submitted_key(&self.root, &job_id);
        let status_key = keys::job_status_key(&self.root, &job_id);

        self.store
            .txn(
                vec![Predicate::KeyAbsent { key: spec_key.clone() }],
                vec![
                    TxnOp::put(spec_key, to_json_bytes(&spec)),
                    TxnOp::put(submitted_key, to_json_bytes(&now)),
                    TxnOp::put(status_key, to_json_bytes(&JobStatus::Pending)),
                ],
                vec![],
            )
            .await?;

        info!(job_id = %job_id, "job submitted");
        Ok(job_id)
    }

    /// Assembles a `JobInfo` by reading the job's sub-keys. `Ok(None)`
    /// if the job does not exist.
    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobInfo>, JobEngineError> {
        let spec_key = keys::job_spec_key(&self.root, job_id);
        let spec: JobSpec = match self.store.get(&spec_key).await? {
            Some(kv) => kv.json()?,
            None => return Ok(None),
        };

        let submitted = self
            .store
            .get(&keys::job_submitted_key(&self.root, job_id))
            .await?
            .map(|kv| kv.json())
            .transpose()?
            .unwrap_or_else(Utc::now);

        let started = self
            .store
            .get(&keys::job_started_key(&self.root, job_id))
            .await?
            .map(|kv| kv.json())
            .transpose()?;

        let completed = self
            .store
            .get(&keys::job_completed_key(&self.root, job_id))
            .await?
            .map(|kv| kv.json())
            .transpose()?;

        let cancelled = self
            .store
            .get(&keys::job_cancelled_key(&self.root, job_id))
            .await?
            .map(|kv| kv.json())
            .transpose()?;

        let status = self
            .store
            .get(&keys::job_status_key(&self.root, job_id))
            .await?
            .map(|kv| kv.json())
            .transpose()?
            .unwrap_or(JobStatus::Pending);

        Ok(Some(JobInfo {
            job_id: job_id.to_string(),
            spec,
            status,
            submitted,
            started,
            completed,
            cancelled,
        }))
    }

    /// Prefix-scans `P/jobs/` for distinct job ids and assembles each
    /// via [`Self::get_job`].
    #[instrument(skip(self))]
    pub async fn list_jobs(&self) -> Result<Vec<JobInfo>, JobEngineError> {
        let prefix = keys::jobs_prefix(&self.root);
        let entries = self.store.list(&prefix).await?;

        let mut job_ids = std::collections::BTreeSet::new();
        for kv in entries {
            if let Some(rest) = kv.key.strip_prefix(&prefix) {
                if let Some(job_id) = rest.split('/').next() {
                    job_ids.insert(job_id.to_string());
                }
            }
        }

        let mut jobs = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            if let Some(job) = self.get_job(&job_id).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    #[instrument(skip(self))]
    pub async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<(), JobEngineError> {
        self.ensure_exists(job_id).await?;
        let key = keys::job_status_key(&self.root, job_id);
        self.store.put(&key, to_json_bytes(&status), None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn mark_job_started(&self, job_id: &str) -> Result<(), JobEngineError> {
        self.ensure_exists(job_id).await?;
        let started_key = keys::job_started_key(&self.root, job_id);
        let status_key = keys::job_status_key(&self.root, job_id);
        let now = Utc::now();
        self.store
            .txn(
                vec![],
                vec![
                    TxnOp::put(started_key, to_json_bytes(&now)),
                    TxnOp::put(status_key, to_json_bytes(&JobStatus::Running)),
                ],
                vec![],
            )
            .await?;
        Ok(())
    }

    /// Transitions to `completed` — called only by the head monitor,
    /// the only component that transitions jobs to terminal states.
    #[instrument(skip(self))]
    pub async fn mark_job_completed(&self, job_id: &str) -> Result<(), JobEngineError> {
        self.mark_terminal(job_id, JobStatus::Completed).await
    }

    /// Transitions to `failed` — reached when the monitor observes at
    /// least one permanently-failed shard and no remaining claimable
    /// work.
    #[instrument(skip(self))]
    pub async fn mark_job_failed(&self, job_id: &str) -> Result<(), JobEngineError> {
        self.mark_terminal(job_id, JobStatus::Failed).await
    }

    async fn mark_terminal(&self, job_id: &str, status: JobStatus) -> Result<(), JobEngineError> {
        self.ensure_exists(job_id).await?;
        let completed_key = keys::job_completed_key(&self.root, job_id);
        let status_key = keys::job_status_key(&self.root, job_id);
        let now = Utc::now();
        self.store
            .txn(
                vec![],
                vec![
                    TxnOp::put(completed_key, to_json_bytes(&now)),
                    TxnOp::put(status_key, to_json_bytes(&status)),
                ],
                vec![],
            )
            .await?;
        info!(job_id = %job_id, %status, "job reached terminal state");
        Ok(())
    }

    /// `cancelled` is reachable from any non-terminal status.
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: &str) -> Result<(), JobEngineError> {
        self.ensure_exists(job_id).await?;
        let cancelled_key = keys::job_cancelled_key(&self.root, job_id);
        let status_key = keys::job_status_key(&self.root, job_id);
        let now = Utc::now();
        self.store
            .txn(
                vec![],
                vec![
                    TxnOp::put(cancelled_key, to_json_bytes(&now)),
                    TxnOp::put(status_key, to_json_bytes(&JobStatus::Cancelled)),
                ],
                vec![],
            )
            .await?;
        info!(job_id = %job_id, "job cancelled");
        Ok(())
    }

    /// Presence check on the `cancelled` key — cheap enough that
    /// shard processors can call it per-shard before starting work.
    #[instrument(skip(self))]
    pub async fn is_job_cancelled(&self, job_id: &str) -> Result<bool, JobEngineError> {
        let key = keys::job_cancelled_key(&self.root, job_id);
        Ok(self.store.get(&key).await?.is_some())
    }

    async fn ensure_exists(&self, job_id: &str) -> Result<(), JobEngineError> {
        let spec_key = keys::job_spec_key(&self.root, job_id);
        if self.store.get(&spec_key).await?.is_none() {
            return Err(JobEngineError::NotFound(job_id.to_string()));
        }
        Ok(())
    }
}
