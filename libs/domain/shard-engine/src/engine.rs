// [libs/domain/shard-engine/src/engine.rs]
//! Shard lifecycle: bulk creation, claim/renew/release,
//! done/failed reporting, orphan discovery and reclamation, and the
//! admin-only split/reset verbs. Every multi-key change here is one
//! atomic `CoordinationStore::txn` call — no component writes related
//! keys in separate round trips.

use std::sync::Arc;

use certslurp_coordination_store::{to_json_bytes, CoordinationStore, Predicate, TxnOp};
use certslurp_config::ShardPolicy;
use certslurp_domain_models::keys;
use certslurp_domain_models::{Manifest, ShardAssignment, ShardAssignmentStatus, ShardRange};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{info, instrument, warn};

use crate::errors::ShardEngineError;

/// A shard released back to the pool (not failed) sits in a short
/// backoff so the same worker doesn't immediately re-claim it before
/// another worker gets a chance.
const RELEASE_BACKOFF_SECS: i64 = 5;

pub struct ShardEngine {
    store: Arc<dyn CoordinationStore>,
    root: String,
    policy: ShardPolicy,
}

impl ShardEngine {
    pub fn new(store: Arc<dyn CoordinationStore>, root: impl Into<String>, policy: ShardPolicy) -> Self {
        ShardEngine {
            store,
            root: root.into(),
            policy,
        }
    }

    /// Idempotent creation: each range's `range` key is written only if
    /// absent, and `shard_count` is fixed on the very first call.
    #[instrument(skip(self, ranges), fields(job_id = %job_id, n = ranges.len()))]
    pub async fn bulk_create_shards(&self, job_id: &str, ranges: &[ShardRange]) -> Result<(), ShardEngineError> {
        for range in ranges {
            let range_key = keys::shard_range_key(&self.root, job_id, range.shard_id);
            let result = self
                .store
                .txn(
                    vec![Predicate::KeyAbsent { key: range_key.clone() }],
                    vec![TxnOp::put(range_key, to_json_bytes(range))],
                    vec![],
                )
                .await?;
            if !result.succeeded {
                continue;
            }
        }

        let count_key = keys::shard_count_key(&self.root, job_id);
        let attempted = ranges.len() as u64;
        let result = self
            .store
            .txn(
                vec![Predicate::KeyAbsent { key: count_key.clone() }],
                vec![TxnOp::put(count_key.clone(), to_json_bytes(&attempted))],
                vec![],
            )
            .await?;

        if !result.succeeded {
            let existing = self.get_shard_count(job_id).await?.unwrap_or(0);
            if existing != attempted {
                warn!(existing, attempted, "bulk_create_shards called again with a different shard count");
            }
        } else {
            info!(shard_count = attempted, "shard_count fixed for job");
        }
        Ok(())
    }

    pub fn policy(&self) -> ShardPolicy {
        self.policy
    }

    #[instrument(skip(self))]
    pub async fn get_shard_count(&self, job_id: &str) -> Result<Option<u64>, ShardEngineError> {
        let key = keys::shard_count_key(&self.root, job_id);
        Ok(match self.store.get(&key).await? {
            Some(kv) => Some(kv.json()?),
            None => None,
        })
    }

    async fn get_range(&self, job_id: &str, shard_id: u64) -> Result<Option<ShardRange>, ShardEngineError> {
        let key = keys::shard_range_key(&self.root, job_id, shard_id);
        Ok(match self.store.get(&key).await? {
            Some(kv) => Some(kv.json()?),
            None => None,
        })
    }

    async fn get_assignment_raw(
        &self,
        job_id: &str,
        shard_id: u64,
    ) -> Result<(ShardAssignment, Option<i64>), ShardEngineError> {
        let key = keys::shard_assignment_key(&self.root, job_id, shard_id);
        match self.store.get(&key).await? {
            Some(kv) => Ok((kv.json()?, Some(kv.mod_revision))),
            None => Ok((ShardAssignment::default(), None)),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_shard_status(
        &self,
        job_id: &str,
        shard_id: u64,
    ) -> Result<Option<ShardAssignmentStatus>, ShardEngineError> {
        let range = match self.get_range(job_id, shard_id).await? {
            Some(r) => r,
            None => return Ok(None),
        };
        let (assignment, _) = self.get_assignment_raw(job_id, shard_id).await?;
        Ok(Some(ShardAssignmentStatus { range, assignment }))
    }

    /// Materializes `range ∪ assignment` for every shard of `job_id`.
    #[instrument(skip(self))]
    pub async fn get_shard_assignments(&self, job_id: &str) -> Result<Vec<ShardAssignmentStatus>, ShardEngineError> {
        let prefix = keys::shards_prefix(&self.root, job_id);
        let entries = self.store.list(&prefix).await?;

        let mut ranges = std::collections::BTreeMap::new();
        let mut assignments = std::collections::BTreeMap::new();
        for kv in entries {
            if let Some(shard_id) = keys::parse_shard_id_from_key(&self.root, job_id, &kv.key) {
                if kv.key.ends_with("/range") {
                    ranges.insert(shard_id, kv.json::<ShardRange>()?);
                } else if kv.key.ends_with("/assignment") {
                    assignments.insert(shard_id, kv.json::<ShardAssignment>()?);
                }
            }
        }

        Ok(ranges
            .into_iter()
            .map(|(shard_id, range)| ShardAssignmentStatus {
                range,
                assignment: assignments.remove(&shard_id).unwrap_or_default(),
            })
            .collect())
    }

    /// Same as [`Self::get_shard_assignments`], filtered to
    /// `[start, end)` shard ids — the worker's window-sampling scan.
    #[instrument(skip(self))]
    pub async fn get_shard_assignments_window(
        &self,
        job_id: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<ShardAssignmentStatus>, ShardEngineError> {
        let all = self.get_shard_assignments(job_id).await?;
        Ok(all
            .into_iter()
            .filter(|s| s.range.shard_id >= start && s.range.shard_id < end)
            .collect())
    }

    fn claim_error_for(&self, job_id: &str, shard_id: u64, assignment: &ShardAssignment, now: DateTime<Utc>) -> ShardEngineError {
        if let Some(until) = assignment.backoff_until {
            if now < until {
                return ShardEngineError::InBackoff {
                    job_id: job_id.to_string(),
                    shard_id,
                };
            }
        }
        ShardEngineError::AlreadyAssigned {
            job_id: job_id.to_string(),
            shard_id,
        }
    }

    /// Claims a shard for `worker_id`.
    /// Returns one of the claim-contention errors
    /// (`ShardEngineError::is_claim_contention`) when another worker
    /// wins the race or the shard isn't yet claimable.
    #[instrument(skip(self), fields(job_id = %job_id, shard_id, worker_id = %worker_id))]
    pub async fn assign_shard(
        &self,
        job_id: &str,
        shard_id: u64,
        worker_id: &str,
    ) -> Result<ShardAssignment, ShardEngineError> {
        self.get_range(job_id, shard_id)
            .await?
            .ok_or_else(|| ShardEngineError::RangeNotFound {
                job_id: job_id.to_string(),
                shard_id,
            })?;

        let now = Utc::now();
        let (current, revision) = self.get_assignment_raw(job_id, shard_id).await?;

        if !current.is_claimable(now) {
            return Err(self.claim_error_for(job_id, shard_id, &current, now));
        }

        let new_assignment = ShardAssignment {
            worker_id: Some(worker_id.to_string()),
            assigned_at: Some(now),
            lease_expiry: Some(now + ChronoDuration::seconds(self.policy.lease_secs as i64)),
            retries: current.retries,
            backoff_until: None,
            done: false,
            failed: false,
            manifest: None,
        };

        let assignment_key = keys::shard_assignment_key(&self.root, job_id, shard_id);
        let predicate = match revision {
            Some(rev) => Predicate::ModRevisionEquals { key: assignment_key.clone(), revision: rev },
            None => Predicate::KeyAbsent { key: assignment_key.clone() },
        };

        let result = self
            .store
            .txn(
                vec![predicate],
                vec![TxnOp::put(assignment_key, to_json_bytes(&new_assignment))],
                vec![],
            )
            .await?;

        if !result.succeeded {
            return Err(ShardEngineError::AssignmentRace {
                job_id: job_id.to_string(),
                shard_id,
            });
        }

        info!("shard claimed");
        Ok(new_assignment)
    }

    /// Extends `leaseExpiry`; predicate is "current holder matches and
    /// not done/failed" — workers must call this at ≤ ⅓ lease TTL
    /// to avoid a reclaim race.
    #[instrument(skip(self), fields(job_id = %job_id, shard_id, worker_id = %worker_id))]
    pub async fn renew_shard_lease(&self, job_id: &str, shard_id: u64, worker_id: &str) -> Result<(), ShardEngineError> {
        let (current, revision) = self.get_assignment_raw(job_id, shard_id).await?;
        self.require_holder(job_id, shard_id, worker_id, &current)?;

        let now = Utc::now();
        let renewed = ShardAssignment {
            lease_expiry: Some(now + ChronoDuration::seconds(self.policy.lease_secs as i64)),
            ..current
        };

        let assignment_key = keys::shard_assignment_key(&self.root, job_id, shard_id);
        let result = self
            .store
            .txn(
                vec![Predicate::ModRevisionEquals {
                    key: assignment_key.clone(),
                    revision: revision.expect("renew requires an existing assignment"),
                }],
                vec![TxnOp::put(assignment_key, to_json_bytes(&renewed))],
                vec![],
            )
            .await?;

        if !result.succeeded {
            return Err(ShardEngineError::AssignmentRace {
                job_id: job_id.to_string(),
                shard_id,
            });
        }
        Ok(())
    }

    /// Releases the lease voluntarily, preserving `retries`, with a
    /// short backoff so the releasing worker doesn't win the re-claim
    /// race against peers that were also scanning.
    #[instrument(skip(self), fields(job_id = %job_id, shard_id, worker_id = %worker_id))]
    pub async fn release_shard_lease(&self, job_id: &str, shard_id: u64, worker_id: &str) -> Result<(), ShardEngineError> {
        let (current, revision) = self.get_assignment_raw(job_id, shard_id).await?;
        self.require_holder(job_id, shard_id, worker_id, &current)?;

        let released = ShardAssignment {
            worker_id: None,
            assigned_at: None,
            lease_expiry: None,
            backoff_until: Some(Utc::now() + ChronoDuration::seconds(RELEASE_BACKOFF_SECS)),
            ..current
        };

        self.write_assignment_cas(job_id, shard_id, revision, &released).await
    }

    /// `ReportShardDone`: exactly one caller wins the CAS (testable
    /// property 2).
    #[instrument(skip(self, manifest), fields(job_id = %job_id, shard_id, worker_id = %worker_id))]
    pub async fn report_shard_done(
        &self,
        job_id: &str,
        shard_id: u64,
        worker_id: &str,
        manifest: Manifest,
    ) -> Result<(), ShardEngineError> {
        let (current, revision) = self.get_assignment_raw(job_id, shard_id).await?;
        if current.done {
            return Err(ShardEngineError::AlreadyDone {
                job_id: job_id.to_string(),
                shard_id,
            });
        }
        self.require_holder(job_id, shard_id, worker_id, &current)?;

        let done = ShardAssignment {
            done: true,
            manifest: Some(manifest),
            ..current
        };

        let assignment_key = keys::shard_assignment_key(&self.root, job_id, shard_id);
        let result = self
            .store
            .txn(
                vec![Predicate::ModRevisionEquals {
                    key: assignment_key.clone(),
                    revision: revision.expect("done requires an existing assignment"),
                }],
                vec![TxnOp::put(assignment_key, to_json_bytes(&done))],
                vec![],
            )
            .await?;

        if !result.succeeded {
            return Err(ShardEngineError::AlreadyDone {
                job_id: job_id.to_string(),
                shard_id,
            });
        }
        info!("shard done");
        Ok(())
    }

    /// `ReportShardFailed`: jittered exponential backoff while
    /// `retries ≤ MaxShardRetries`; beyond that the shard is
    /// permanently failed.
    #[instrument(skip(self), fields(job_id = %job_id, shard_id, worker_id = %worker_id))]
    pub async fn report_shard_failed(&self, job_id: &str, shard_id: u64, worker_id: &str) -> Result<(), ShardEngineError> {
        let (current, revision) = self.get_assignment_raw(job_id, shard_id).await?;
        self.require_holder(job_id, shard_id, worker_id, &current)?;

        let retries = current.retries + 1;
        let permanently_failed = retries > self.policy.max_retries;

        let failed = if permanently_failed {
            ShardAssignment {
                worker_id: None,
                assigned_at: None,
                lease_expiry: None,
                retries,
                backoff_until: None,
                done: false,
                failed: true,
                manifest: None,
            }
        } else {
            let backoff = certslurp_config::exp_backoff(retries, &self.policy);
            ShardAssignment {
                worker_id: None,
                assigned_at: None,
                lease_expiry: None,
                retries,
                backoff_until: Some(Utc::now() + ChronoDuration::from_std(backoff).unwrap_or_default()),
                done: false,
                failed: false,
                manifest: None,
            }
        };

        if permanently_failed {
            warn!(retries, "shard permanently failed");
        }

        self.write_assignment_cas(job_id, shard_id, revision, &failed).await
    }

    /// Admin-only: marks `shard_id` done (split out), appends
    /// `new_ranges` as fresh shards extending the dense id space, and
    /// bumps `shard_count` — all in one transaction.
    #[instrument(skip(self, new_ranges), fields(job_id = %job_id, shard_id, n = new_ranges.len()))]
    pub async fn request_shard_split(
        &self,
        job_id: &str,
        shard_id: u64,
        new_ranges: &[ShardRange],
    ) -> Result<(), ShardEngineError> {
        let count = self.get_shard_count(job_id).await?.unwrap_or(0);
        let (current_assignment, revision) = self.get_assignment_raw(job_id, shard_id).await?;

        let split_done = ShardAssignment { done: true, ..current_assignment };
        let assignment_key = keys::shard_assignment_key(&self.root, job_id, shard_id);
        let count_key = keys::shard_count_key(&self.root, job_id);

        let mut predicates = vec![Predicate::ModRevisionEquals {
            key: count_key.clone(),
            revision: self.count_revision(job_id).await?,
        }];
        if let Some(rev) = revision {
            predicates.push(Predicate::ModRevisionEquals { key: assignment_key.clone(), revision: rev });
        }

        let mut ops = vec![
            TxnOp::put(assignment_key, to_json_bytes(&split_done)),
            TxnOp::put(count_key, to_json_bytes(&(count + new_ranges.len() as u64))),
        ];
        for range in new_ranges {
            let range_key = keys::shard_range_key(&self.root, job_id, range.shard_id);
            ops.push(TxnOp::put(range_key, to_json_bytes(range)));
        }

        let result = self.store.txn(predicates, ops, vec![]).await?;
        if !result.succeeded {
            return Err(ShardEngineError::AssignmentRace {
                job_id: job_id.to_string(),
                shard_id,
            });
        }
        info!(new_count = count + new_ranges.len() as u64, "shard split applied");
        Ok(())
    }

    async fn count_revision(&self, job_id: &str) -> Result<i64, ShardEngineError> {
        let key = keys::shard_count_key(&self.root, job_id);
        Ok(self.store.get(&key).await?.map(|kv| kv.mod_revision).unwrap_or(0))
    }

    /// Shards whose lease has elapsed without completion (GLOSSARY
    /// "Orphan").
    #[instrument(skip(self))]
    pub async fn find_orphaned_shards(&self, job_id: &str) -> Result<Vec<u64>, ShardEngineError> {
        let now = Utc::now();
        let statuses = self.get_shard_assignments(job_id).await?;
        Ok(statuses
            .into_iter()
            .filter(|s| s.assignment.is_orphaned(now))
            .map(|s| s.range.shard_id)
            .collect())
    }

    /// Head-side orphan reclamation: clears the assignment
    /// (worker/lease/backoff) but preserves `retries`, up
    /// to `batch_size` shards, so the shards become claimable again
    /// without penalizing the worker that eventually comes back.
    #[instrument(skip(self))]
    pub async fn reclaim_orphans(&self, job_id: &str, batch_size: usize) -> Result<Vec<u64>, ShardEngineError> {
        let orphans = self.find_orphaned_shards(job_id).await?;
        let mut reclaimed = Vec::new();
        for shard_id in orphans.into_iter().take(batch_size) {
            let (current, revision) = self.get_assignment_raw(job_id, shard_id).await?;
            if !current.is_orphaned(Utc::now()) {
                continue; // raced with another reclaimer or a renew
            }
            let cleared = ShardAssignment {
                worker_id: None,
                assigned_at: None,
                lease_expiry: None,
                backoff_until: None,
                ..current
            };
            if self.write_assignment_cas(job_id, shard_id, revision, &cleared).await.is_ok() {
                reclaimed.push(shard_id);
            }
        }
        if !reclaimed.is_empty() {
            info!(count = reclaimed.len(), "reclaimed orphaned shards");
        }
        Ok(reclaimed)
    }

    /// Worker-facing convenience: atomically claims up to `batch_size`
    /// currently orphaned shards directly for `new_worker`.
    #[instrument(skip(self), fields(job_id = %job_id, new_worker = %new_worker))]
    pub async fn reassign_orphaned_shards(
        &self,
        job_id: &str,
        new_worker: &str,
        batch_size: usize,
    ) -> Result<Vec<u64>, ShardEngineError> {
        let orphans = self.find_orphaned_shards(job_id).await?;
        let mut claimed = Vec::new();
        for shard_id in orphans.into_iter().take(batch_size) {
            match self.assign_shard(job_id, shard_id, new_worker).await {
                Ok(_) => claimed.push(shard_id),
                Err(e) if e.is_claim_contention() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(claimed)
    }

    /// Admin-only: clears `failed`, zeroes `retries`, removes
    /// `backoffUntil`.
    #[instrument(skip(self), fields(job_id = %job_id, shard_id))]
    pub async fn reset_failed_shard(&self, job_id: &str, shard_id: u64) -> Result<(), ShardEngineError> {
        let (current, revision) = self.get_assignment_raw(job_id, shard_id).await?;
        if !current.failed {
            return Ok(());
        }
        let reset = ShardAssignment {
            failed: false,
            retries: 0,
            backoff_until: None,
            ..current
        };
        self.write_assignment_cas(job_id, shard_id, revision, &reset).await
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn reset_failed_shards(&self, job_id: &str) -> Result<Vec<u64>, ShardEngineError> {
        let statuses = self.get_shard_assignments(job_id).await?;
        let mut reset_ids = Vec::new();
        for status in statuses {
            if status.assignment.failed {
                self.reset_failed_shard(job_id, status.range.shard_id).await?;
                reset_ids.push(status.range.shard_id);
            }
        }
        Ok(reset_ids)
    }

    fn require_holder(
        &self,
        job_id: &str,
        shard_id: u64,
        worker_id: &str,
        assignment: &ShardAssignment,
    ) -> Result<(), ShardEngineError> {
        match &assignment.worker_id {
            Some(holder) if holder == worker_id => Ok(()),
            _ => Err(ShardEngineError::NotHolder {
                job_id: job_id.to_string(),
                shard_id,
                worker_id: worker_id.to_string(),
            }),
        }
    }

    async fn write_assignment_cas(
        &self,
        job_id: &str,
        shard_id: u64,
        revision: Option<i64>,
        assignment: &ShardAssignment,
    ) -> Result<(), ShardEngineError> {
        let assignment_key = keys::shard_assignment_key(&self.root, job_id, shard_id);
        let predicate = match revision {
            Some(rev) => Predicate::ModRevisionEquals { key: assignment_key.clone(), revision: rev },
            None => Predicate::KeyAbsent { key: assignment_key.clone() },
        };
        let result = self
            .store
            .txn(vec![predicate], vec![TxnOp::put(assignment_key, to_json_bytes(assignment))], vec![])
            .await?;
        if !result.succeeded {
            return Err(ShardEngineError::AssignmentRace {
                job_id: job_id.to_string(),
                shard_id,
            });
        }
        Ok(())
    }
}
