//! Outbound request pacing.
//!
//! `throttle` is called before every attempt, retries included, and waits
//! until three conditions hold: the minimum spacing since the previous call
//! has passed, the sliding request budget has room, and any server-signalled
//! hold-off (`Retry-After`) has expired.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::Clock;
use crate::config::RateLimitConfig;

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    last_call: Option<Instant>,
    window: VecDeque<Instant>,
    hold_until: Option<Instant>,
    throttles: u64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_call: None,
            window: VecDeque::new(),
            hold_until: None,
            throttles: 0,
        }
    }

    /// Block until the next call may go out, then record it as sent.
    pub fn throttle(&mut self, clock: &impl Clock) {
        let now = clock.now();
        let ready = self.ready_at(now);
        if ready > now {
            let wait = ready - now;
            debug!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
            clock.sleep(wait);
        }

        let sent = clock.now();
        self.last_call = Some(sent);
        self.window.push_back(sent);
        self.hold_until = None;
        self.throttles += 1;
    }

    /// Postpone the next call by at least `wait` from now.
    pub fn hold_off(&mut self, clock: &impl Clock, wait: Duration) {
        let until = clock.now() + wait;
        self.hold_until = Some(self.hold_until.map_or(until, |current| current.max(until)));
    }

    /// Number of calls let through so far.
    pub fn throttle_count(&self) -> u64 {
        self.throttles
    }

    fn ready_at(&mut self, now: Instant) -> Instant {
        let mut ready = now;
        if let Some(last) = self.last_call {
            ready = ready.max(last + self.config.min_interval);
        }
        if let Some(until) = self.hold_until {
            ready = ready.max(until);
        }

        let window = self.config.budget_window;
        while self
            .window
            .front()
            .is_some_and(|&sent| now.saturating_duration_since(sent) >= window)
        {
            self.window.pop_front();
        }
        if self.window.len() >= self.config.budget_requests as usize {
            // The oldest call in the window has to age out before there is room.
            let excess = self.window.len() + 1 - self.config.budget_requests as usize;
            if let Some(&oldest) = self.window.get(excess - 1) {
                ready = ready.max(oldest + window);
            }
        }
        ready
    }
}
