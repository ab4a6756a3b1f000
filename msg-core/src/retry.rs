//! Retry policy for sends.
//!
//! Only transient failures (network, service outage) are retried inside the
//! messenger. Rate limiting is surfaced so the caller can honour the server's
//! retry-after hint.

use cloudmsg_types::ErrorKind;
use std::time::Duration;

/// Capped exponential backoff with jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `attempts` is clamped to at least one.
    pub fn new(attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Try once, never retry.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Whether a failure of `kind` after `attempts_made` attempts should be retried.
    pub fn should_retry(&self, kind: ErrorKind, attempts_made: u32) -> bool {
        attempts_made < self.attempts
            && matches!(kind, ErrorKind::Network | ErrorKind::ServiceUnavailable)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `base * 2^(retry-1)`, capped at `max_delay`, plus up to half of
    /// `base_delay` of jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        let jitter_cap = (self.base_delay.as_millis() / 2) as u64;
        backoff + Duration::from_millis(random_jitter_ms(jitter_cap))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(8))
    }
}

/// Random jitter in `0..=cap` milliseconds.
fn random_jitter_ms(cap: u64) -> u64 {
    if cap == 0 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0;
    }
    u64::from_le_bytes(bytes) % (cap + 1)
}
