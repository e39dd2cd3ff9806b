//! Pure backoff and retry-cap policy.

use std::time::Duration;

/// Maximum push attempts before a row is considered permanently failed.
pub const MAX_RETRIES: i32 = 5;

/// Ceiling on any computed backoff delay.
pub const MAX_DELAY_SECS: u64 = 30;

/// Cooldown before a permanently failed row is eligible for auto-recovery.
pub const AUTO_RECOVERY_COOLDOWN_SECS: i64 = 3600;

/// Exponential backoff for the given zero-based attempt, capped at
/// [`MAX_DELAY_SECS`].
pub fn delay(attempt: u32) -> Duration {
    let exp = attempt.min(6);
    Duration::from_secs((1_u64 << exp).min(MAX_DELAY_SECS))
}

/// Whether a row with the given persisted attempt count may be retried.
pub fn can_retry(retry_count: i32) -> bool {
    retry_count < MAX_RETRIES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_exponential_and_capped() {
        assert_eq!(delay(0), Duration::from_secs(1));
        assert_eq!(delay(1), Duration::from_secs(2));
        assert_eq!(delay(2), Duration::from_secs(4));
        assert_eq!(delay(3), Duration::from_secs(8));
        assert_eq!(delay(4), Duration::from_secs(16));
        assert_eq!(delay(5), Duration::from_secs(30));
        assert_eq!(delay(80), Duration::from_secs(30));
    }

    #[test]
    fn delay_is_monotonic() {
        for k in 0..10 {
            assert!(delay(k) <= delay(k + 1));
            assert!(delay(k) <= Duration::from_secs(MAX_DELAY_SECS));
        }
    }

    #[test]
    fn retry_cap_refuses_at_max() {
        assert!(can_retry(0));
        assert!(can_retry(MAX_RETRIES - 1));
        assert!(!can_retry(MAX_RETRIES));
        assert!(!can_retry(MAX_RETRIES + 1));
    }
}
