//! How many times a segment is re-run, and how long to wait in between.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::FetchError;

use super::classify::classify;

/// Backoff for re-running a failed segment.
///
/// The wait before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`. `max_attempts` counts the first run, so 1 disables retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    /// Negative or NaN base delays become zero; one too large for a
    /// `Duration` becomes the cap.
    fn from(config: &RetryConfig) -> Self {
        let max_delay = Duration::from_secs(config.max_delay_secs);
        let base_delay = if config.base_delay_secs.is_nan() || config.base_delay_secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(config.base_delay_secs).unwrap_or(max_delay)
        };
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1 = the first re-run).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before the next run of a segment that has failed `attempts`
    /// times with `error`, or `None` when the segment should stay failed:
    /// the attempts are used up, or the error would repeat on every run
    /// (local storage, ignored ranges, client errors).
    pub fn next_delay(&self, attempts: u32, error: &FetchError) -> Option<Duration> {
        if attempts >= self.max_attempts || !classify(error).is_transient() {
            return None;
        }
        Some(self.backoff(attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let p = policy(10);
        let waits: Vec<_> = (1..=6).map(|n| p.backoff(n).as_millis()).collect();
        assert_eq!(waits, vec![250, 500, 1000, 2000, 2000, 2000]);
        assert_eq!(p.backoff(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn server_side_failures_are_retried_until_attempts_run_out() {
        let p = policy(3);
        let busy = FetchError::Http(503);
        assert_eq!(p.next_delay(1, &busy), Some(Duration::from_millis(250)));
        assert_eq!(p.next_delay(2, &busy), Some(Duration::from_millis(500)));
        assert_eq!(p.next_delay(3, &busy), None);

        let cut_short = FetchError::PartialTransfer {
            expected: 4000,
            received: 1000,
        };
        assert!(p.next_delay(1, &cut_short).is_some());
        assert!(p.next_delay(1, &FetchError::Http(502)).is_some());
    }

    #[test]
    fn repeatable_failures_are_not_retried() {
        let p = policy(5);
        let disk = FetchError::Storage(io::Error::new(io::ErrorKind::Other, "disk full"));
        let ignored = FetchError::RangeNotHonored {
            start: 100,
            end: 199,
            status: 200,
        };
        assert_eq!(p.next_delay(1, &disk), None);
        assert_eq!(p.next_delay(1, &ignored), None);
        assert_eq!(p.next_delay(1, &FetchError::Http(404)), None);
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        assert_eq!(policy(1).next_delay(1, &FetchError::Http(503)), None);
    }

    #[test]
    fn built_from_retry_config() {
        let p = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            base_delay_secs: 0.5,
            max_delay_secs: 15,
        });
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.base_delay, Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_secs(15));

        for bad in [-1.0, f64::NAN] {
            let p = RetryPolicy::from(&RetryConfig {
                base_delay_secs: bad,
                ..RetryConfig::default()
            });
            assert_eq!(p.base_delay, Duration::ZERO);
        }
        let p = RetryPolicy::from(&RetryConfig {
            base_delay_secs: f64::INFINITY,
            ..RetryConfig::default()
        });
        assert_eq!(p.base_delay, p.max_delay);
    }

    #[test]
    fn default_matches_default_config() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.base_delay, Duration::from_millis(250));
        assert_eq!(p.max_delay, Duration::from_secs(30));
    }
}
