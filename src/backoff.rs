//! Exponential reconnect delay.
//!
//! The delay sequence for consecutive failures is `0, initial, 2*initial, ...`
//! capped at `max`. With the defaults that is `0, 0.5, 1, 2, 4, ... 60` seconds.
//! The first retry is immediate; every following one doubles the previous
//! non-zero delay.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds of the backoff sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// First non-zero delay, in seconds.
    #[serde(default = "default_initial_secs")]
    pub initial_secs: f64,
    /// Upper bound of the delay, in seconds.
    #[serde(default = "default_max_secs")]
    pub max_secs: f64,
}

fn default_initial_secs() -> f64 {
    0.5
}

fn default_max_secs() -> f64 {
    60.0
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_secs: default_initial_secs(),
            max_secs: default_max_secs(),
        }
    }
}

impl BackoffPolicy {
    /// Check that both bounds are finite, positive, and ordered.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.initial_secs.is_finite() && self.initial_secs > 0.0) {
            return Err(format!(
                "Invalid backoff initial_secs {}. Must be > 0",
                self.initial_secs
            ));
        }
        if !(self.max_secs.is_finite() && self.max_secs >= self.initial_secs) {
            return Err(format!(
                "Invalid backoff max_secs {}. Must be >= initial_secs ({})",
                self.max_secs, self.initial_secs
            ));
        }
        Ok(())
    }
}

/// Consecutive-failure counter expressed as the next delay to wait.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    delay_secs: f64,
}

impl Backoff {
    /// Start a fresh sequence at zero delay.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            delay_secs: 0.0,
        }
    }

    /// Delay the next retry would wait, without advancing.
    pub fn current(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs)
    }

    /// Return the delay to wait after a failure and advance the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current();
        let doubled = self.delay_secs * 2.0;
        let next = if doubled > 0.0 {
            doubled
        } else {
            self.policy.initial_secs
        };
        self.delay_secs = next.min(self.policy.max_secs);
        delay
    }

    /// Forget previous failures after a successful connection.
    pub fn reset(&mut self) {
        self.delay_secs = 0.0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
