//! Core domain types for the background task queue.
//!
//! This crate contains shared types used across all packages:
//! - Job kinds, payloads and job records
//! - Retry policy and queue configuration
//! - Admin read models and the shared error type

mod admin;
mod config;
mod error;
mod job;
mod payload;
mod retry;

pub use admin::{DEFAULT_LIST_LIMIT, JobView, ListJobsOptions, QueueStats, summarize_payload};
pub use config::{
    DriverKind, ENV_BACKOFF_MS, ENV_CONCURRENCY, ENV_DRIVER, ENV_JOB_TIMEOUT_MS,
    ENV_MAX_ATTEMPTS, ENV_POLL_INTERVAL_MS, QueueConfig,
};
pub use error::QueueError;
pub use job::{ClaimedJob, JobId, JobRecord, JobStatus};
pub use payload::{
    AnalyticsKpiPayload, InventoryMaintenancePayload, JobKind, JobPayload,
    OrderAccountingPayload,
};
pub use retry::{RetryDecision, RetryPolicy};
