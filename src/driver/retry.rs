//! Bounded retry with fixed backoff for transient driver failures

use std::thread;
use std::time::Duration;

use crate::observability::{log_event_with_fields, Event};

use super::errors::DriverResult;

/// Retry policy: `attempts` total tries, `backoff` between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `op`, retrying transient errors. Non-transient errors and the
    /// last transient error are returned as-is.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> DriverResult<T>
    where
        F: FnMut() -> DriverResult<T>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    log_event_with_fields(
                        Event::DriverRetry,
                        &[
                            ("operation", operation),
                            ("attempt", &attempt.to_string()),
                            ("max_attempts", &self.attempts.to_string()),
                            ("error", &e.to_string()),
                        ],
                    );
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}
