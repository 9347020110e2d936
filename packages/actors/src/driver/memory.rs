//! In-process driver: a FIFO plus retry timers. Nothing survives a restart.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use taskqueue_core::{
    ClaimedJob, DriverKind, JobId, JobPayload, QueueError, RetryDecision, RetryPolicy,
};
use tokio::sync::Notify;

use super::{Backlog, QueueDriver};

#[derive(Default)]
struct Shared {
    ready: Mutex<VecDeque<ClaimedJob>>,
    delayed: AtomicUsize,
    waker: Arc<Notify>,
}

impl Shared {
    fn ready(&self) -> MutexGuard<'_, VecDeque<ClaimedJob>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Memory-backed queue driver.
///
/// Jobs that exhaust their attempts are dropped with an error log; there
/// is no failed state to inspect.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    shared: Arc<Shared>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule_retry(&self, job: ClaimedJob, decision: RetryDecision) {
        let RetryDecision::Retry { attempts, delay } = decision else {
            return;
        };

        let shared = self.shared.clone();
        shared.delayed.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared
                .ready()
                .push_back(ClaimedJob::new(job.id, job.payload, attempts));
            shared.delayed.fetch_sub(1, Ordering::SeqCst);
            shared.waker.notify_one();
        });
    }
}

impl QueueDriver for MemoryDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Memory
    }

    fn push(&self, payload: JobPayload) -> BoxFuture<'_, Result<JobId, QueueError>> {
        let job = ClaimedJob::new(JobId::new(), payload, 0);
        let id = job.id;
        self.shared.ready().push_back(job);
        ready(Ok(id)).boxed()
    }

    fn claim(&self) -> BoxFuture<'_, Result<Option<ClaimedJob>, QueueError>> {
        let job = self.shared.ready().pop_front();
        ready(Ok(job)).boxed()
    }

    fn complete(&self, _id: JobId) -> BoxFuture<'_, Result<(), QueueError>> {
        ready(Ok(())).boxed()
    }

    fn fail(
        &self,
        job: ClaimedJob,
        message: String,
        policy: RetryPolicy,
    ) -> BoxFuture<'_, Result<RetryDecision, QueueError>> {
        let decision = policy.decide(job.attempts);
        match decision {
            RetryDecision::Retry { .. } => self.schedule_retry(job, decision),
            RetryDecision::GiveUp { attempts } => {
                tracing::error!(
                    job_id = %job.id,
                    kind = %job.payload.kind(),
                    attempt = attempts,
                    error = %message,
                    "Dropping job after exhausting attempts"
                );
            }
        }
        ready(Ok(decision)).boxed()
    }

    fn discard(&self, _id: JobId) -> BoxFuture<'_, Result<(), QueueError>> {
        ready(Ok(())).boxed()
    }

    fn recover(&self) -> BoxFuture<'_, Result<usize, QueueError>> {
        ready(Ok(0)).boxed()
    }

    fn waker(&self) -> Arc<Notify> {
        self.shared.waker.clone()
    }

    fn backlog(&self) -> Backlog {
        Backlog {
            queued: self.shared.ready().len(),
            delayed: self.shared.delayed.load(Ordering::SeqCst),
        }
    }
}
