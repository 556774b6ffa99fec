//! Bounded exponential backoff policy
//!
//! Replaces an unbounded retry-on-failure login loop: attempts are capped and
//! each retry waits `min(max_delay, base_delay * 2^attempt)`. The policy also
//! carries the timeout that bounds every network exchange.

use std::time::Duration;

use crate::settings::RetrySettings;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failed login attempts tolerated before giving up.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound on every authorize/refresh/end-session exchange.
    pub network_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            network_timeout: Duration::from_secs(settings.network_timeout_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based: the first retry waits
    /// `base_delay * 2`). Saturates at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let millis = u64::try_from(self.base_delay.as_millis())
            .unwrap_or(u64::MAX)
            .saturating_mul(1_u64 << shift);
        Duration::from_millis(millis).min(self.max_delay)
    }

    #[must_use]
    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            network_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = policy();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_caps_at_max() {
        let policy = policy();
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(64), Duration::from_secs(30));
    }

    #[test]
    fn exhaustion_at_cap() {
        let policy = policy();
        assert!(!policy.attempts_exhausted(4));
        assert!(policy.attempts_exhausted(5));
        assert!(policy.attempts_exhausted(6));
    }

    #[test]
    fn settings_conversion() {
        let policy = RetryPolicy::from(&crate::settings::RetrySettings {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            network_timeout_secs: 10,
        });
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.network_timeout, Duration::from_secs(10));
    }
}
