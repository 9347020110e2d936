//! The task queue service: producer, admin and lifecycle entry point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use db::Database;
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef};
use taskqueue_core::{
    AnalyticsKpiPayload, DriverKind, InventoryMaintenancePayload, JobId, JobPayload, JobStatus,
    JobView, ListJobsOptions, OrderAccountingPayload, QueueConfig, QueueError, QueueStats,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::driver::{MemoryDriver, QueueDriver, SurrealDriver};
use crate::handler::HandlerRegistry;
use crate::messages::{PoolActivity, PoolMessage};
use crate::pool::{PoolArgs, WorkerPool};
use crate::recovery::recover_stranded_jobs;

/// How often shutdown re-checks for in-flight executions.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running task queue.
///
/// Owns the worker pool and the handler registry. Share it behind an
/// `Arc`; call [`TaskQueue::shutdown`] to drain before exit.
pub struct TaskQueue {
    config: QueueConfig,
    driver: Arc<dyn QueueDriver>,
    handlers: Arc<HandlerRegistry>,
    pool: ActorRef<PoolMessage>,
    pool_handle: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl TaskQueue {
    /// Start a queue over `driver`.
    ///
    /// Durable drivers are swept for stranded jobs before the pool claims
    /// anything.
    pub async fn start(
        mut config: QueueConfig,
        driver: Arc<dyn QueueDriver>,
        handlers: HandlerRegistry,
    ) -> Result<Self, QueueError> {
        config.driver = driver.kind();
        config.concurrency = config.concurrency.max(1);

        recover_stranded_jobs(driver.as_ref()).await?;

        let handlers = Arc::new(handlers);
        let args = PoolArgs {
            driver: driver.clone(),
            handlers: handlers.clone(),
            config: config.clone(),
        };
        let (pool, pool_handle) = Actor::spawn(None, WorkerPool, args)
            .await
            .map_err(|e| QueueError::Pool(format!("Failed to spawn worker pool: {e}")))?;

        tracing::info!(
            driver = %config.driver,
            concurrency = config.concurrency,
            max_attempts = config.retry.max_attempts,
            handlers = ?handlers.kinds(),
            "Task queue started"
        );

        Ok(Self {
            config,
            driver,
            handlers,
            pool,
            pool_handle: Mutex::new(Some(pool_handle)),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Start a queue on the in-process driver.
    pub async fn memory(config: QueueConfig, handlers: HandlerRegistry) -> Result<Self, QueueError> {
        Self::start(config, Arc::new(MemoryDriver::new()), handlers).await
    }

    /// Start a queue on the SurrealDB driver. The schema must already exist.
    pub async fn surreal(
        config: QueueConfig,
        db: Database,
        handlers: HandlerRegistry,
    ) -> Result<Self, QueueError> {
        Self::start(config, Arc::new(SurrealDriver::new(db)), handlers).await
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn driver_kind(&self) -> DriverKind {
        self.driver.kind()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Accept a job for background execution.
    ///
    /// Returns `Ok(None)` without storing anything when no handler is
    /// registered for the payload's kind.
    pub async fn enqueue(
        &self,
        payload: impl Into<JobPayload>,
    ) -> Result<Option<JobId>, QueueError> {
        let payload = payload.into();
        let kind = payload.kind();

        if self.is_shutting_down() {
            tracing::warn!(kind = %kind, "Rejecting job, queue is shutting down");
            return Err(QueueError::ShuttingDown);
        }

        if !self.handlers.has_handler(kind) {
            tracing::warn!(kind = %kind, "No handler registered, discarding job");
            return Ok(None);
        }

        let job_id = self.driver.push(payload).await?;
        tracing::debug!(job_id = %job_id, kind = %kind, "Job enqueued");
        self.pump();

        Ok(Some(job_id))
    }

    pub async fn enqueue_order_accounting(
        &self,
        payload: OrderAccountingPayload,
    ) -> Result<Option<JobId>, QueueError> {
        self.enqueue(payload).await
    }

    pub async fn enqueue_inventory_maintenance(
        &self,
        payload: InventoryMaintenancePayload,
    ) -> Result<Option<JobId>, QueueError> {
        self.enqueue(payload).await
    }

    pub async fn enqueue_analytics_kpi(
        &self,
        payload: AnalyticsKpiPayload,
    ) -> Result<Option<JobId>, QueueError> {
        self.enqueue(payload).await
    }

    /// Current queue statistics.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let stats = self.driver.stats().await?;
        let driver = self.driver.kind();

        Ok(QueueStats {
            driver,
            concurrency: self.config.concurrency,
            max_attempts: self.config.retry.max_attempts,
            pending: stats.pending,
            active: stats.active,
            failed: stats.failed,
            delayed: stats.delayed,
            next_available_at: stats.next_available_at,
            last_failure_at: stats.last_failure_at,
            supports_persistence: driver.supports_persistence(),
        })
    }

    pub async fn list_jobs(&self, options: ListJobsOptions) -> Result<Vec<JobView>, QueueError> {
        self.driver.list_jobs(options).await
    }

    /// Reset a job to run again from its first attempt.
    pub async fn retry_job(&self, id: JobId) -> Result<JobView, QueueError> {
        let job = self.driver.retry_job(id).await?;
        tracing::info!(job_id = %id, kind = %job.kind, "Job queued for retry");
        self.pump();
        Ok(job)
    }

    pub async fn delete_job(&self, id: JobId) -> Result<(), QueueError> {
        self.driver.delete_job(id).await?;
        tracing::info!(job_id = %id, "Job deleted");
        Ok(())
    }

    /// Delete all jobs with `status`, optionally only those untouched for
    /// `older_than_minutes`. Zero means no age filter.
    pub async fn purge_jobs(
        &self,
        status: JobStatus,
        older_than_minutes: Option<u64>,
    ) -> Result<usize, QueueError> {
        let older_than = older_than_minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)));

        let deleted = self.driver.purge_jobs(status, older_than).await?;
        tracing::info!(status = %status, older_than_minutes = ?older_than_minutes, deleted, "Purged jobs");
        Ok(deleted)
    }

    /// In-flight and buffered work, as seen by the pool.
    pub async fn activity(&self) -> Result<PoolActivity, QueueError> {
        let result = ractor::rpc::call(
            &self.pool,
            |reply| PoolMessage::GetActivity { reply },
            None,
        )
        .await;

        match result {
            Ok(CallResult::Success(activity)) => Ok(activity),
            Ok(_) => Err(QueueError::Pool("Worker pool did not reply".into())),
            Err(e) => Err(QueueError::Pool(e.to_string())),
        }
    }

    /// Stop accepting jobs, wait for running executions, then stop the pool.
    ///
    /// Memory-driver jobs that never started are lost.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Shutting down task queue");

        let drained = self.drain().await;

        self.pool.stop(None);
        if let Some(handle) = self.pool_handle.lock().await.take() {
            handle
                .await
                .map_err(|e| QueueError::Pool(format!("Worker pool ended abnormally: {e}")))?;
        }
        drained?;

        tracing::info!("Task queue stopped");
        Ok(())
    }

    /// Wait until no execution is in flight.
    async fn drain(&self) -> Result<(), QueueError> {
        if self.pool.send_message(PoolMessage::BeginShutdown).is_err() {
            return Ok(());
        }
        loop {
            let activity = self.activity().await?;
            if activity.active == 0 {
                let lost = activity.queued + activity.delayed;
                if lost > 0 && !self.driver.kind().supports_persistence() {
                    tracing::warn!(
                        queued = activity.queued,
                        delayed = activity.delayed,
                        "Discarding buffered jobs on shutdown"
                    );
                }
                break;
            }
            tracing::debug!(active = activity.active, "Waiting for running jobs");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        Ok(())
    }

    fn pump(&self) {
        if let Err(e) = self.pool.send_message(PoolMessage::Pump) {
            tracing::warn!(error = %e, "Failed to wake worker pool");
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.pool.stop(None);
    }
}
