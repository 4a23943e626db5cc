//! Bounded retry with exponential backoff.
//!
//! `Backoff::run` wraps a single idempotent async call and retries it while a
//! caller-supplied decider says so, sleeping between attempts. The decider
//! sees the attempt counters and the latest result; reaching the attempt
//! budget always stops, so no loop can retry forever.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Maximum number of attempts before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// First retry delay in milliseconds.
const DEFAULT_BASE_DELAY_MS: u64 = 750;

/// Ceiling for a single retry delay.
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Backoff {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter: true,
        }
    }
}

impl Backoff {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `attempt_fn` until the decider stops or the budget is exhausted.
    ///
    /// The decider receives `(attempt, max_attempts, &result)` with `attempt`
    /// starting at 1, and returns whether to retry. `on_retry` is invoked
    /// before each sleep, for progress reporting. The last result is returned
    /// as-is, success or failure.
    pub async fn run<T, F, Fut, D, R>(&self, mut attempt_fn: F, mut decider: D, mut on_retry: R) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        D: FnMut(u32, u32, &T) -> bool,
        R: FnMut(u32, u32),
    {
        let mut attempt: u32 = 1;
        loop {
            let result = attempt_fn().await;
            if attempt >= self.max_attempts || !decider(attempt, self.max_attempts, &result) {
                return result;
            }
            on_retry(attempt, self.max_attempts);
            tokio::time::sleep(self.delay_for(attempt)).await;
            attempt += 1;
        }
    }

    /// Delay before the attempt following `attempt`, exponential with a cap.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let cap = self.max_delay.as_millis() as u64;
        // 2^(attempt-1), clamped before the multiply can overflow
        let factor = 1u64 << (attempt - 1).min(20);
        let millis = base.saturating_mul(factor).min(cap);
        if self.jitter && millis > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
        } else {
            Duration::from_millis(millis)
        }
    }
}
