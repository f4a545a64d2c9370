//! Bounded retries with exponential backoff.
//!
//! `RetryPolicy::run` is the only place in the crate that decides to try a
//! call again or to wait between attempts. Every attempt, the first one
//! included, is preceded by `RateLimiter::throttle`, so backoff and request
//! spacing add up instead of overlapping.

use std::time::Duration;

use tracing::warn;

use crate::clock::Clock;
use crate::config::RetryConfig;
use crate::error::{ApiError, SyncError};
use crate::rate_limit::RateLimiter;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Delay after the given failed attempt (1-based): base, 2x base, 4x ...
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.config
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retriable error, or the
    /// attempt budget is spent.
    pub fn run<T, C, F>(
        &self,
        clock: &C,
        limiter: &mut RateLimiter,
        mut op: F,
    ) -> Result<T, SyncError>
    where
        C: Clock,
        F: FnMut() -> Result<T, ApiError>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            limiter.throttle(clock);
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retriable() {
                return Err(SyncError::Api(err));
            }
            if attempt >= max_attempts {
                return Err(SyncError::RetryExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            if let Some(wait) = err.retry_after() {
                limiter.hold_off(clock, wait);
            }
            let delay = self.backoff(attempt);
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            clock.sleep(delay);
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RateLimitConfig;

    fn http(status: u16) -> ApiError {
        ApiError::Http {
            status,
            body: String::new(),
            retry_after: None,
        }
    }

    fn unpaced() -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            min_interval: Duration::ZERO,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        });
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
        assert_eq!(policy.backoff(60), Duration::from_secs(5));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let clock = ManualClock::default();
        let mut limiter = unpaced();
        let calls = Cell::new(0);
        let result = RetryPolicy::default().run(&clock, &mut limiter, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(http(500))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
        assert_eq!(limiter.throttle_count(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn non_retriable_error_surfaces_after_one_call() {
        let clock = ManualClock::default();
        let mut limiter = unpaced();
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::default().run(&clock, &mut limiter, || {
            calls.set(calls.get() + 1);
            Err(http(401))
        });
        assert_eq!(result, Err(SyncError::Api(http(401))));
        assert_eq!(calls.get(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn exhaustion_reports_attempts_and_last_error() {
        let clock = ManualClock::default();
        let mut limiter = unpaced();
        let result: Result<(), _> =
            RetryPolicy::default().run(&clock, &mut limiter, || Err(http(503)));
        assert_eq!(
            result,
            Err(SyncError::RetryExhausted {
                attempts: 3,
                last: http(503),
            })
        );
        assert_eq!(limiter.throttle_count(), 3);
    }

    #[test]
    fn retry_after_holds_off_beyond_backoff() {
        let clock = ManualClock::default();
        let mut limiter = unpaced();
        let calls = Cell::new(0);
        let result = RetryPolicy::default().run(&clock, &mut limiter, || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(ApiError::Http {
                    status: 429,
                    body: String::new(),
                    retry_after: Some(Duration::from_secs(5)),
                })
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
        // 1s backoff, then the limiter waits out the remaining 4s.
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(4)]
        );
    }
}
