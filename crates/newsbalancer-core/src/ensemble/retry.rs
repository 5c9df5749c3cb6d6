//! Backoff computation for transient model failures.

use rand::Rng;
use std::time::Duration;

/// Maximum retries for streaming/network/server-transient failures before
/// advancing to the next model in the chain.
pub const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Default wait when a rate-limit response carries no retry-after hint.
pub const DEFAULT_RATE_LIMIT_HINT_SECS: u64 = 30;

/// Exponential backoff for transient failures: base 500 ms doubled per
/// attempt, with ±20% jitter. `attempt` is 1-based.
pub fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 500u64.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let jitter_span = base_ms / 5;

    let delay_ms = if jitter_span == 0 {
        base_ms
    } else {
        rand::thread_rng().gen_range(base_ms - jitter_span..=base_ms + jitter_span)
    };

    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt_within_jitter() {
        for (attempt, base) in [(1u32, 500u64), (2, 1000), (3, 2000)] {
            for _ in 0..20 {
                let delay = backoff_delay(attempt).as_millis() as u64;
                assert!(delay >= base - base / 5, "attempt {attempt}: {delay}");
                assert!(delay <= base + base / 5, "attempt {attempt}: {delay}");
            }
        }
    }
}
