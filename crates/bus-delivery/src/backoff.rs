//! # Retry Backoff
//!
//! Exponential delay schedule for Tier 2 retries: starts at the configured
//! base, doubles per attempt, capped at the ceiling.

use std::time::Duration;

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
}

impl Backoff {
    /// Creates a schedule from the configured base and ceiling.
    #[must_use]
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self { base, ceiling }
    }

    /// Delay before the given attempt (1-based).
    ///
    /// Attempt 1 waits `base`, attempt 2 waits `2 * base`, and so on,
    /// never exceeding the ceiling.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = 2u32.saturating_pow(exponent);
        self.base.saturating_mul(factor).min(self.ceiling)
    }
}
