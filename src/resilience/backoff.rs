//! Delay between etcd retry rounds.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay before retry round `round`. Round 0 is the first pass over the
/// machines and never waits.
///
/// Round `n` waits `base_delay_ms * 2^(n-1)`, capped at `max_delay_ms`,
/// plus up to a tenth of that again so clients sharing a cluster spread out.
pub fn calculate_backoff(round: u32, policy: &RetryConfig) -> Duration {
    let Some(doublings) = round.checked_sub(1) else {
        return Duration::ZERO;
    };

    let delay = 1u64
        .checked_shl(doublings)
        .map_or(u64::MAX, |factor| policy.base_delay_ms.saturating_mul(factor))
        .min(policy.max_delay_ms);
    let spread = rand::thread_rng().gen_range(0..=delay / 10);

    Duration::from_millis(delay + spread)
}
