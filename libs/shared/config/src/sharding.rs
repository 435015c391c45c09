// [libs/shared/config/src/sharding.rs]
//! Auto-sharding: turning a CT log's tree size into a shard count when
//! the job spec leaves `shard_size` at zero.

/// Tiered table mapping a tree size bracket to a default shard size.
/// Smaller logs get smaller shards so a handful of workers can still
/// parallelize; very large logs cap the shard count so coordination
/// overhead (one etcd key per shard) stays bounded.
const TIERS: &[(u64, u64)] = &[
    (1_000, 100),
    (10_000, 500),
    (1_000_000, 5_000),
    (u64::MAX, 50_000),
];

/// Picks a shard size for `tree_size` from [`TIERS`], the first
/// bracket whose upper bound is `>= tree_size`.
pub fn auto_shard_size(tree_size: u64) -> u64 {
    TIERS
        .iter()
        .find(|(upper, _)| tree_size <= *upper)
        .map(|(_, size)| *size)
        .unwrap_or(50_000)
}

/// Splits `[index_start, index_end)` into half-open shard ranges of
/// `shard_size`, with the final shard absorbing the remainder. Shard
/// ranges are immutable once created, so this is the only place that
/// decides where the cuts fall.
pub fn plan_shards(index_start: u64, index_end: u64, shard_size: u64) -> Vec<(u64, u64)> {
    if index_end <= index_start || shard_size == 0 {
        return Vec::new();
    }
    let mut ranges = Vec::new();
    let mut from = index_start;
    while from < index_end {
        let to = (from + shard_size).min(index_end);
        ranges.push((from, to));
        from = to;
    }
    ranges
}

/// Resolves the effective shard size for a job: an explicit
/// `shard_size` in the spec wins, otherwise the tree size picks one
/// from [`auto_shard_size`].
pub fn effective_shard_size(requested: u64, tree_size: u64) -> u64 {
    if requested > 0 {
        requested
    } else {
        auto_shard_size(tree_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_log_uses_small_shards() {
        assert_eq!(auto_shard_size(500), 100);
    }

    #[test]
    fn mid_log_uses_mid_shards() {
        assert_eq!(auto_shard_size(500_000), 5_000);
    }

    #[test]
    fn huge_log_uses_max_tier() {
        assert_eq!(auto_shard_size(1_000_000_000), 50_000);
    }

    /// A 2500-entry log with `shard_size = 0` auto-shards into 5
    /// shards of 500 entries each.
    #[test]
    fn scenario_s6_auto_shards_into_five_shards_of_500() {
        let tree_size = 2_500;
        let shard_size = effective_shard_size(0, tree_size);
        assert_eq!(shard_size, 500);

        let ranges = plan_shards(0, tree_size, shard_size);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[0], (0, 500));
        assert_eq!(ranges[4], (2_000, 2_500));
        for (from, to) in &ranges {
            assert_eq!(to - from, 500);
        }
    }

    #[test]
    fn plan_shards_last_range_absorbs_remainder() {
        let ranges = plan_shards(0, 2_350, 500);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[4], (2_000, 2_350));
    }

    #[test]
    fn empty_range_plans_no_shards() {
        assert!(plan_shards(100, 100, 500).is_empty());
        assert!(plan_shards(100, 50, 500).is_empty());
    }

    #[test]
    fn explicit_shard_size_overrides_auto_sizing() {
        assert_eq!(effective_shard_size(10, 5_000_000), 10);
    }
}
