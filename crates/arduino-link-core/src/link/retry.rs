//! Port-open retry policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::LinkError;

/// Largest accepted backoff growth factor
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Exponential backoff settings for reopening a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before giving up (0 = never give up)
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on the delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor applied after each failure
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 2000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy for reopening a lost link from the poll loop: never gives up
    pub fn reconnect() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }

    /// A policy that tries exactly once
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Check that the policy describes a usable schedule
    pub fn validate(&self) -> Result<(), LinkError> {
        if !self.multiplier.is_finite()
            || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.multiplier)
        {
            return Err(LinkError::InvalidSetting(format!(
                "backoff multiplier must be between 1 and {}, got {}",
                MAX_BACKOFF_MULTIPLIER, self.multiplier
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(LinkError::InvalidSetting(format!(
                "initial delay {} ms exceeds max delay {} ms",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Delay schedule driven by a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
    delay: Duration,
}

impl Backoff {
    /// Fresh schedule with no recorded failures
    pub fn new(policy: RetryPolicy) -> Self {
        let delay = Duration::from_millis(policy.initial_delay_ms);
        Self {
            policy,
            failures: 0,
            delay,
        }
    }

    /// Record a failed attempt.
    ///
    /// Returns how long to wait before the next attempt, or `None` once
    /// `max_attempts` attempts have failed.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.policy.max_attempts != 0 && self.failures >= self.policy.max_attempts {
            return None;
        }

        let current = self.delay;
        let max = Duration::from_millis(self.policy.max_delay_ms);
        let factor = if self.policy.multiplier.is_finite() && self.policy.multiplier >= 1.0 {
            self.policy.multiplier
        } else {
            1.0
        };
        self.delay = Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .map(|next| next.min(max))
            .unwrap_or(max);
        Some(current.min(max))
    }

    /// Forget past failures after a successful attempt
    pub fn reset(&mut self) {
        self.failures = 0;
        self.delay = Duration::from_millis(self.policy.initial_delay_ms);
    }

    /// Failed attempts since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// True once the policy allows no further attempts
    pub fn is_exhausted(&self) -> bool {
        self.policy.max_attempts != 0 && self.failures >= self.policy.max_attempts
    }
}
