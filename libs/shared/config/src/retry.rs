// [libs/shared/config/src/retry.rs]
//! Shard lease/retry policy and the jittered exponential backoff used
//! by `ReportShardFailed`.

use std::time::Duration;

/// Tunables for how long a shard lease lives and how aggressively a
/// failed shard backs off before becoming claimable again.
#[derive(Debug, Clone, Copy)]
pub struct ShardPolicy {
    pub lease_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub backoff_jitter_pct: u8,
}

impl Default for ShardPolicy {
    fn default() -> Self {
        ShardPolicy {
            lease_secs: 60,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 300_000,
            backoff_jitter_pct: 25,
        }
    }
}

/// `min(cap, base * 2^retries)`, jittered by `±jitter_pct%`. `retries`
/// is the retry count *after* the failure being backed off from, so
/// the first failure (retries == 1) backs off by roughly `base`.
pub fn exp_backoff(retries: u32, policy: &ShardPolicy) -> Duration {
    exp_backoff_with_rng(retries, policy, &mut rand::thread_rng())
}

/// Same as [`exp_backoff`] but takes an explicit RNG, so tests can
/// assert on the jitter bounds deterministically.
pub fn exp_backoff_with_rng<R: rand::Rng>(
    retries: u32,
    policy: &ShardPolicy,
    rng: &mut R,
) -> Duration {
    let exponent = retries.saturating_sub(1).min(32);
    let unjittered = policy
        .backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(policy.backoff_cap_ms);

    if policy.backoff_jitter_pct == 0 {
        return Duration::from_millis(unjittered);
    }

    let jitter_span = (unjittered * policy.backoff_jitter_pct as u64) / 100;
    let delta = rng.gen_range(0..=(2 * jitter_span)) as i64 - jitter_span as i64;
    let jittered = (unjittered as i64 + delta).max(0) as u64;
    Duration::from_millis(jittered.min(policy.backoff_cap_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn policy() -> ShardPolicy {
        ShardPolicy {
            lease_secs: 60,
            max_retries: 10,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 300_000,
            backoff_jitter_pct: 25,
        }
    }

    #[test]
    fn first_retry_is_roughly_base() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let d = exp_backoff_with_rng(1, &policy(), &mut rng);
        assert!(d.as_millis() >= 750 && d.as_millis() <= 1_250);
    }

    #[test]
    fn backoff_is_capped() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(2);
        let d = exp_backoff_with_rng(20, &policy(), &mut rng);
        assert!(d.as_millis() as u64 <= policy().backoff_cap_ms);
    }

    #[test]
    fn zero_jitter_is_exact() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        let mut p = policy();
        p.backoff_jitter_pct = 0;
        assert_eq!(exp_backoff_with_rng(1, &p, &mut rng).as_millis(), 1_000);
        assert_eq!(exp_backoff_with_rng(2, &p, &mut rng).as_millis(), 2_000);
        assert_eq!(exp_backoff_with_rng(3, &p, &mut rng).as_millis(), 4_000);
    }

    proptest::proptest! {
        #[test]
        fn backoff_never_exceeds_cap(retries in 0u32..64) {
            let mut rng = rand::thread_rng();
            let d = exp_backoff_with_rng(retries, &policy(), &mut rng);
            proptest::prop_assert!(d.as_millis() as u64 <= policy().backoff_cap_ms);
        }
    }
}
