//! Bounded exponential backoff for playback faults

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Failed attempts allowed before giving up
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `n` (0-based): `base * factor^n`, capped
    pub fn delay_ms(&self, n: u32) -> u64 {
        let cap = self.max_delay_ms as f64;
        let mut delay = self.base_delay_ms as f64;
        for _ in 0..n.min(64) {
            if delay >= cap {
                break;
            }
            delay *= self.backoff_factor;
        }
        if delay >= cap {
            self.max_delay_ms
        } else {
            delay as u64
        }
    }
}

/// What to do about a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay_ms: u64 },
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    retry_count: u32,
    exhausted: bool,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry_count: 0,
            exhausted: false,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.max_retries
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Register a fault. The fault that uses up the budget exhausts it.
    pub fn on_fault(&mut self) -> RetryDecision {
        if self.exhausted {
            return RetryDecision::Exhausted {
                attempts: self.retry_count,
            };
        }

        let delay_ms = self.policy.delay_ms(self.retry_count);
        self.retry_count = (self.retry_count + 1).min(self.policy.max_retries);

        if self.retry_count >= self.policy.max_retries {
            return self.exhaust();
        }

        warn!(
            "Playback fault, retry {}/{} in {}ms",
            self.retry_count, self.policy.max_retries, delay_ms
        );
        RetryDecision::Retry {
            attempt: self.retry_count,
            delay_ms,
        }
    }

    /// Give up immediately
    pub fn exhaust(&mut self) -> RetryDecision {
        self.exhausted = true;
        RetryDecision::Exhausted {
            attempts: self.retry_count.max(1),
        }
    }

    /// Playback recovered. Returns whether a retry was in progress.
    pub fn on_success(&mut self) -> bool {
        let was_retrying = self.retry_count > 0;
        if was_retrying {
            info!("Playback recovered after {} retries", self.retry_count);
        }
        self.retry_count = 0;
        was_retrying
    }

    /// Manual reset; clears exhaustion
    pub fn reset(&mut self) {
        self.retry_count = 0;
        self.exhausted = false;
    }
}
