//! Queue drivers: where jobs wait between enqueue and execution.
//!
//! The worker pool and the admin operations only talk to [`QueueDriver`];
//! the backend is chosen once at startup.

mod memory;
mod surreal;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use taskqueue_core::{
    ClaimedJob, DriverKind, JobId, JobPayload, JobStatus, JobView, ListJobsOptions, QueueError,
    RetryDecision, RetryPolicy,
};
use tokio::sync::Notify;

pub use memory::MemoryDriver;
pub use surreal::SurrealDriver;

/// Store-side part of the queue statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverStats {
    pub pending: u64,
    pub active: u64,
    pub failed: u64,
    pub delayed: u64,
    pub next_available_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Jobs held by a driver that have not started executing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backlog {
    /// Ready to be claimed.
    pub queued: usize,
    /// Waiting for a retry backoff to elapse.
    pub delayed: usize,
}

/// A queue backend.
///
/// Job operations are required. Admin operations default to
/// [`QueueError::Unsupported`] and are overridden by backends that keep
/// inspectable records.
pub trait QueueDriver: Send + Sync + 'static {
    fn kind(&self) -> DriverKind;

    /// Accept a new job.
    fn push(&self, payload: JobPayload) -> BoxFuture<'_, Result<JobId, QueueError>>;

    /// Take the next ready job, if any, marking it in flight.
    fn claim(&self) -> BoxFuture<'_, Result<Option<ClaimedJob>, QueueError>>;

    /// The job's handler succeeded.
    fn complete(&self, id: JobId) -> BoxFuture<'_, Result<(), QueueError>>;

    /// The job's handler failed with `message`. Returns what the policy decided.
    fn fail(
        &self,
        job: ClaimedJob,
        message: String,
        policy: RetryPolicy,
    ) -> BoxFuture<'_, Result<RetryDecision, QueueError>>;

    /// Drop a job that has no handler.
    fn discard(&self, id: JobId) -> BoxFuture<'_, Result<(), QueueError>>;

    /// Return jobs stranded in flight by a previous process to the ready set.
    fn recover(&self) -> BoxFuture<'_, Result<usize, QueueError>>;

    /// Notified when a job becomes ready outside of enqueue, e.g. a retry timer firing.
    fn waker(&self) -> Arc<Notify>;

    /// Jobs not yet started. Only meaningful for in-process backends.
    fn backlog(&self) -> Backlog {
        Backlog::default()
    }

    fn stats(&self) -> BoxFuture<'_, Result<DriverStats, QueueError>> {
        unsupported("stats", self.kind())
    }

    fn list_jobs(
        &self,
        _options: ListJobsOptions,
    ) -> BoxFuture<'_, Result<Vec<JobView>, QueueError>> {
        unsupported("list_jobs", self.kind())
    }

    fn retry_job(&self, _id: JobId) -> BoxFuture<'_, Result<JobView, QueueError>> {
        unsupported("retry_job", self.kind())
    }

    fn delete_job(&self, _id: JobId) -> BoxFuture<'_, Result<(), QueueError>> {
        unsupported("delete_job", self.kind())
    }

    fn purge_jobs(
        &self,
        _status: JobStatus,
        _older_than: Option<Duration>,
    ) -> BoxFuture<'_, Result<usize, QueueError>> {
        unsupported("purge_jobs", self.kind())
    }
}

fn unsupported<'a, T: Send + 'a>(
    operation: &'static str,
    driver: DriverKind,
) -> BoxFuture<'a, Result<T, QueueError>> {
    ready(Err(QueueError::unsupported(operation, driver))).boxed()
}
