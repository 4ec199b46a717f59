//! Exponential backoff schedule for transient write failures.

use std::time::Duration;

/// Backoff delays for a given attempt count and base: `base * 2^n` for
/// attempts after the first, capped so a misconfigured attempt count
/// cannot produce hour-long sleeps.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Delay to sleep before retry number `attempt` (1-based; attempt 0 is the
/// initial try and has no delay).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(attempt - 1);
    base.saturating_mul(factor).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), Duration::ZERO);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 30), MAX_DELAY);
    }
}
