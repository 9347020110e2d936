//! Retry policy with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff: `base_delay * 2^attempt`, no jitter and no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total executions before a job is terminally failed.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

/// What to do with a job whose execution just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Make the job eligible again after `delay`, recording `attempts`.
    Retry { attempts: u32, delay: Duration },
    /// Attempts exhausted; `attempts` is the final count.
    GiveUp { attempts: u32 },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff before the retry that follows `attempt` previous attempts.
    ///
    /// Saturates at `Duration::MAX` once the multiplication overflows.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u128
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.as_nanos().checked_mul(factor))
            .and_then(from_nanos)
            .unwrap_or(Duration::MAX)
    }

    /// Decide the next state of a job that failed after `attempts` previous attempts.
    pub fn decide(&self, attempts: u32) -> RetryDecision {
        let next = attempts.saturating_add(1);
        if next >= self.max_attempts {
            RetryDecision::GiveUp { attempts: next }
        } else {
            RetryDecision::Retry {
                attempts: next,
                delay: self.delay(attempts),
            }
        }
    }
}

fn from_nanos(nanos: u128) -> Option<Duration> {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    // Remainder is below one second, so it fits in u32.
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    Some(Duration::new(secs, subsec))
}
