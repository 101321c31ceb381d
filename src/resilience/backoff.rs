//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let capped_delay = exponential_delay_ms(attempt, base_ms, max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Doubling delay capped at `max_ms`, without jitter
fn exponential_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    if attempt == 0 {
        return 0;
    }
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    base_ms.saturating_mul(exponential_base).min(max_ms)
}

/// Delay schedule between poll attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: bool,
}

impl Backoff {
    /// Same delay before every attempt
    pub fn constant(interval: Duration) -> Self {
        Self {
            base: interval,
            max: interval,
            jitter: false,
        }
    }

    /// Doubling delay from `base`, capped at `max`, with up to 10% jitter
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: true,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.base == self.max {
            return self.base;
        }
        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        if self.jitter {
            calculate_backoff(attempt, base_ms, max_ms)
        } else {
            Duration::from_millis(exponential_delay_ms(attempt, base_ms, max_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn test_constant_backoff() {
        let backoff = Backoff::constant(Duration::from_secs(10));
        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(7), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_backoff_grows() {
        let backoff = Backoff::exponential(Duration::from_millis(500), Duration::from_secs(5));
        assert!(backoff.delay(1) >= Duration::from_millis(500));
        assert!(backoff.delay(3) >= Duration::from_secs(2));
        assert!(backoff.delay(20) < Duration::from_millis(5500));
    }

    #[test]
    fn test_backoff_without_jitter_is_exact() {
        let backoff = Backoff {
            jitter: false,
            ..Backoff::exponential(Duration::from_millis(100), Duration::from_millis(1000))
        };
        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_millis(1000));
        assert_eq!(backoff.delay(10), backoff.delay(10));
    }

    #[test]
    fn test_backoff_with_jitter_stays_within_ten_percent() {
        let backoff = Backoff::exponential(Duration::from_millis(1000), Duration::from_secs(60));
        for _ in 0..50 {
            let delay = backoff.delay(2);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay < Duration::from_millis(2200));
        }
    }
}
