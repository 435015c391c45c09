// [libs/domain/models/src/shard.rs]
//! Shard entities: `ShardRange`, `ShardAssignment`, and the
//! materialized `ShardAssignmentStatus` view the shard engine hands
//! back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A half-open index window `[index_from, index_to)`. Immutable once
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRange {
    pub shard_id: u64,
    pub index_from: u64,
    pub index_to: u64,
}

impl ShardRange {
    pub fn len(&self) -> u64 {
        self.index_to.saturating_sub(self.index_from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutable claim state for one shard. `done` and `failed` are sticky
/// once set; `retries` is monotonically non-decreasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardAssignment {
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lease_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub backoff_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub manifest: Option<Manifest>,
}

impl ShardAssignment {
    /// Claimable iff not done, not failed, the lease is free (unassigned
    /// or expired), and any backoff window has elapsed.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        if self.done || self.failed {
            return false;
        }
        let lease_free = match self.lease_expiry {
            None => true,
            Some(expiry) => now > expiry,
        };
        let backoff_cleared = match self.backoff_until {
            None => true,
            Some(until) => now >= until,
        };
        lease_free && backoff_cleared
    }

    /// Permanently failed iff `failed=true ∧ retries > MaxShardRetries`.
    pub fn is_permanently_failed(&self, max_retries: u32) -> bool {
        self.failed && self.retries > max_retries
    }

    /// "Effective done" (GLOSSARY): done, or permanently failed.
    pub fn is_effectively_done(&self, max_retries: u32) -> bool {
        self.done || self.is_permanently_failed(max_retries)
    }

    pub fn is_orphaned(&self, now: DateTime<Utc>) -> bool {
        if self.done || self.failed {
            return false;
        }
        match (&self.worker_id, self.lease_expiry) {
            (Some(_), Some(expiry)) => now > expiry,
            _ => false,
        }
    }
}

/// A small record a worker emits on shard completion (GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub record_count: u64,
    pub byte_count: u64,
    pub sink_locator: String,
    pub completed_at: DateTime<Utc>,
}

/// `range ∪ assignment` as materialized by `GetShardStatus`/`GetShardAssignments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardAssignmentStatus {
    pub range: ShardRange,
    pub assignment: ShardAssignment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn fresh_shard_is_claimable() {
        let a = ShardAssignment::default();
        assert!(a.is_claimable(now()));
    }

    #[test]
    fn assigned_with_live_lease_is_not_claimable() {
        let a = ShardAssignment {
            worker_id: Some("w1".into()),
            lease_expiry: Some(now() + Duration::seconds(60)),
            ..Default::default()
        };
        assert!(!a.is_claimable(now()));
    }

    #[test]
    fn assigned_with_expired_lease_is_claimable_and_orphaned() {
        let a = ShardAssignment {
            worker_id: Some("w1".into()),
            lease_expiry: Some(now() - Duration::seconds(1)),
            ..Default::default()
        };
        assert!(a.is_claimable(now()));
        assert!(a.is_orphaned(now()));
    }

    #[test]
    fn in_backoff_is_not_claimable() {
        let a = ShardAssignment {
            backoff_until: Some(now() + Duration::seconds(30)),
            ..Default::default()
        };
        assert!(!a.is_claimable(now()));
    }

    #[test]
    fn done_or_failed_are_never_claimable_regardless_of_lease() {
        let done = ShardAssignment {
            done: true,
            ..Default::default()
        };
        let failed = ShardAssignment {
            failed: true,
            ..Default::default()
        };
        assert!(!done.is_claimable(now()));
        assert!(!failed.is_claimable(now()));
        assert!(!done.is_orphaned(now()));
        assert!(!failed.is_orphaned(now()));
    }

    #[test]
    fn permanent_failure_predicate_matches_resolved_open_question() {
        let a = ShardAssignment {
            failed: true,
            retries: 4,
            ..Default::default()
        };
        assert!(a.is_permanently_failed(3));
        assert!(!a.is_permanently_failed(4));
    }
}
