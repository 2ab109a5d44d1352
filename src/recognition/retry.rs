//! Retry backoff schedule for recognition calls
//!
//! Pure function of the attempt number so the policy is testable without
//! network I/O.

use std::time::Duration;

/// First retry delay.
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Ceiling for the exponential schedule.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Delay to sleep after the given failed attempt (1-based): 1s doubling up
/// to the 60s cap.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let delay = INITIAL_DELAY.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
    delay.min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delay_is_one_second() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_double() {
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), Duration::from_secs(16));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
    }

    #[test]
    fn test_delay_caps_at_sixty_seconds() {
        assert_eq!(backoff_delay(7), Duration::from_secs(60));
        assert_eq!(backoff_delay(12), Duration::from_secs(60));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(60));
    }
}
