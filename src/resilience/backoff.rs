//! Exponential backoff with equal jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based).
///
/// The nominal delay doubles per attempt from `base_ms` up to `max_ms`; the
/// result lies in `[nominal / 2, nominal]` so concurrent relays against the
/// same RPC provider spread out.
pub fn jittered_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 || base_ms == 0 {
        return Duration::ZERO;
    }

    let nominal = base_ms
        .saturating_mul(1u64 << (attempt - 1).min(32))
        .min(max_ms.max(base_ms));
    let half = nominal / 2;
    let jitter = rand::thread_rng().gen_range(0..=nominal - half);

    Duration::from_millis(half + jitter)
}
