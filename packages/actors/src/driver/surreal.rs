//! Durable driver backed by SurrealDB records.

use std::sync::Arc;
use std::time::Duration;

use db::repositories::JobRepository;
use db::{Database, DbError};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use taskqueue_core::{
    ClaimedJob, DriverKind, JobId, JobPayload, JobRecord, JobStatus, JobView, ListJobsOptions,
    QueueError, RetryDecision, RetryPolicy,
};
use tokio::sync::Notify;

use super::{DriverStats, QueueDriver};

/// SurrealDB-backed queue driver.
///
/// Several drivers (in one process or many) may share a database; the
/// repository's conditional claim keeps each job with a single owner.
#[derive(Clone)]
pub struct SurrealDriver {
    repo: JobRepository,
    waker: Arc<Notify>,
}

impl SurrealDriver {
    pub fn new(db: Database) -> Self {
        Self {
            repo: JobRepository::new(db),
            waker: Arc::new(Notify::new()),
        }
    }

    pub fn repository(&self) -> &JobRepository {
        &self.repo
    }

    async fn claim_decodable(&self) -> Result<Option<ClaimedJob>, QueueError> {
        while let Some(record) = self.repo.claim_next().await? {
            match record.decode_payload() {
                Ok(payload) => {
                    tracing::debug!(job_id = %record.id, kind = %record.kind, "Claimed job");
                    return Ok(Some(ClaimedJob::new(record.id, payload, record.attempts)));
                }
                Err(e) => {
                    let message = format!("Invalid payload for kind {}: {e}", record.kind);
                    tracing::error!(job_id = %record.id, kind = %record.kind, error = %e, "Marking undecodable job as failed");
                    self.repo.mark_failed(record.id, &message).await?;
                }
            }
        }
        Ok(None)
    }

    async fn collect_stats(&self) -> Result<DriverStats, QueueError> {
        let counts = self.repo.counts().await?;
        Ok(DriverStats {
            pending: counts.pending,
            active: counts.active,
            failed: counts.failed,
            delayed: 0,
            next_available_at: self.repo.next_available_at().await?,
            last_failure_at: self.repo.last_failure_at().await?,
        })
    }
}

/// Map a repository miss on `id` to the queue's not-found error.
fn for_job(id: JobId) -> impl FnOnce(DbError) -> QueueError {
    move |err| match err {
        DbError::NotFound(_) => QueueError::NotFound(id),
        other => other.into(),
    }
}

impl QueueDriver for SurrealDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Surreal
    }

    fn push(&self, payload: JobPayload) -> BoxFuture<'_, Result<JobId, QueueError>> {
        async move {
            let record = JobRecord::new(&payload)?;
            let created = self.repo.create(&record).await?;
            Ok(created.id)
        }
        .boxed()
    }

    fn claim(&self) -> BoxFuture<'_, Result<Option<ClaimedJob>, QueueError>> {
        self.claim_decodable().boxed()
    }

    fn complete(&self, id: JobId) -> BoxFuture<'_, Result<(), QueueError>> {
        async move {
            if !self.repo.complete(id).await? {
                tracing::warn!(job_id = %id, "Completed job was already gone");
            }
            Ok(())
        }
        .boxed()
    }

    fn fail(
        &self,
        job: ClaimedJob,
        message: String,
        policy: RetryPolicy,
    ) -> BoxFuture<'_, Result<RetryDecision, QueueError>> {
        async move {
            let decision = policy.decide(job.attempts);
            self.repo
                .record_failure(job.id, decision, &message)
                .await
                .map_err(for_job(job.id))?;
            Ok(decision)
        }
        .boxed()
    }

    fn discard(&self, id: JobId) -> BoxFuture<'_, Result<(), QueueError>> {
        async move {
            self.repo.complete(id).await?;
            Ok(())
        }
        .boxed()
    }

    fn recover(&self) -> BoxFuture<'_, Result<usize, QueueError>> {
        async move { Ok(self.repo.recover_active().await?) }.boxed()
    }

    fn waker(&self) -> Arc<Notify> {
        self.waker.clone()
    }

    fn stats(&self) -> BoxFuture<'_, Result<DriverStats, QueueError>> {
        self.collect_stats().boxed()
    }

    fn list_jobs(
        &self,
        options: ListJobsOptions,
    ) -> BoxFuture<'_, Result<Vec<JobView>, QueueError>> {
        async move {
            let records = self.repo.list(&options).await?;
            Ok(records.into_iter().map(JobView::from).collect())
        }
        .boxed()
    }

    fn retry_job(&self, id: JobId) -> BoxFuture<'_, Result<JobView, QueueError>> {
        async move {
            let record = self.repo.retry(id).await.map_err(for_job(id))?;
            Ok(JobView::from(record))
        }
        .boxed()
    }

    fn delete_job(&self, id: JobId) -> BoxFuture<'_, Result<(), QueueError>> {
        async move { self.repo.delete(id).await.map_err(for_job(id)) }.boxed()
    }

    fn purge_jobs(
        &self,
        status: JobStatus,
        older_than: Option<Duration>,
    ) -> BoxFuture<'_, Result<usize, QueueError>> {
        async move { Ok(self.repo.purge(status, older_than).await?) }.boxed()
    }
}
