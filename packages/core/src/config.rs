//! Queue configuration, read from environment-style settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RetryPolicy;

pub const ENV_DRIVER: &str = "TASK_QUEUE_DRIVER";
pub const ENV_CONCURRENCY: &str = "TASK_QUEUE_CONCURRENCY";
pub const ENV_MAX_ATTEMPTS: &str = "TASK_QUEUE_MAX_ATTEMPTS";
pub const ENV_BACKOFF_MS: &str = "TASK_QUEUE_BACKOFF_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "TASK_QUEUE_POLL_INTERVAL_MS";
pub const ENV_JOB_TIMEOUT_MS: &str = "TASK_QUEUE_JOB_TIMEOUT_MS";

/// Which queue backend to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// In-process list and timers. Lost on restart.
    #[default]
    Memory,
    /// SurrealDB-backed records, durable across restarts.
    Surreal,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Memory => "memory",
            DriverKind::Surreal => "surreal",
        }
    }

    pub fn supports_persistence(&self) -> bool {
        matches!(self, DriverKind::Surreal)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(DriverKind::Memory),
            "surreal" | "durable" => Some(DriverKind::Surreal),
            _ => None,
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for queue behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub driver: DriverKind,
    /// Maximum handler executions in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// How often the durable driver looks for ready jobs.
    pub poll_interval: Duration,
    /// Per-execution timeout. `None` lets a handler run indefinitely.
    pub job_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Memory,
            concurrency: 2,
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(1000),
            job_timeout: None,
        }
    }
}

impl QueueConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Missing keys keep their defaults; unparseable or out-of-range values
    /// are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let driver = match lookup(ENV_DRIVER) {
            Some(raw) => DriverKind::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(key = ENV_DRIVER, value = %raw, "unknown queue driver, using memory");
                defaults.driver
            }),
            None => defaults.driver,
        };

        let concurrency = parse_number(&lookup, ENV_CONCURRENCY, |n: usize| n > 0)
            .unwrap_or(defaults.concurrency);
        let max_attempts = parse_number(&lookup, ENV_MAX_ATTEMPTS, |n: u32| n > 0)
            .unwrap_or(defaults.retry.max_attempts);
        let base_delay = parse_number(&lookup, ENV_BACKOFF_MS, |_: u64| true)
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.base_delay);
        let poll_interval = parse_number(&lookup, ENV_POLL_INTERVAL_MS, |n: u64| n > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let job_timeout = parse_number(&lookup, ENV_JOB_TIMEOUT_MS, |n: u64| n > 0)
            .map(Duration::from_millis);

        Self {
            driver,
            concurrency,
            retry: RetryPolicy::new(max_attempts, base_delay),
            poll_interval,
            job_timeout,
        }
    }

    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.retry.base_delay = base_delay;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }
}

fn parse_number<T: std::str::FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    valid: impl Fn(T) -> bool,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if valid(value) => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "invalid queue setting, using default");
            None
        }
    }
}
