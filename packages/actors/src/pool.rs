//! Worker pool actor: bounded-concurrency execution of claimed jobs.

use std::sync::Arc;
use std::time::Duration;

use ractor::{Actor, ActorProcessingErr, ActorRef};
use taskqueue_core::{ClaimedJob, QueueConfig, RetryDecision, RetryPolicy};
use tokio::task::JoinHandle;

use crate::driver::QueueDriver;
use crate::handler::{HandlerFuture, HandlerRegistry};
use crate::messages::{PoolActivity, PoolMessage};

/// Arguments for spawning the pool.
pub struct PoolArgs {
    pub driver: Arc<dyn QueueDriver>,
    pub handlers: Arc<HandlerRegistry>,
    pub config: QueueConfig,
}

/// State for the pool actor.
///
/// Only the actor touches `active`, so claim cycles never overlap.
pub struct PoolState {
    driver: Arc<dyn QueueDriver>,
    handlers: Arc<HandlerRegistry>,
    config: QueueConfig,
    active: usize,
    draining: bool,
    ticker: Option<JoinHandle<()>>,
}

impl PoolState {
    fn has_free_slot(&self) -> bool {
        !self.draining && self.active < self.config.concurrency
    }
}

/// Worker pool actor.
///
/// Re-primed by `Pump` after every enqueue, admin retry and driver wake-up,
/// by its own ticker when the driver needs polling, and after every
/// finished job.
pub struct WorkerPool;

impl Actor for WorkerPool {
    type Msg = PoolMessage;
    type State = PoolState;
    type Arguments = PoolArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            driver = %args.config.driver,
            concurrency = args.config.concurrency,
            "Starting worker pool"
        );

        let poll_interval = args
            .driver
            .kind()
            .supports_persistence()
            .then(|| args.config.poll_interval.max(Duration::from_millis(1)));
        let ticker = spawn_ticker(myself, args.driver.waker(), poll_interval);

        Ok(PoolState {
            driver: args.driver,
            handlers: args.handlers,
            config: args.config,
            active: 0,
            draining: false,
            ticker: Some(ticker),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            PoolMessage::Pump => fill_slots(&myself, state).await,

            PoolMessage::JobFinished => {
                state.active = state.active.saturating_sub(1);
                fill_slots(&myself, state).await;
            }

            PoolMessage::BeginShutdown => {
                if !state.draining {
                    tracing::info!(active = state.active, "Worker pool draining");
                }
                state.draining = true;
            }

            PoolMessage::GetActivity { reply } => {
                let backlog = state.driver.backlog();
                let _ = reply.send(PoolActivity {
                    active: state.active,
                    queued: backlog.queued,
                    delayed: backlog.delayed,
                    draining: state.draining,
                });
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        tracing::info!("Worker pool stopped");
        Ok(())
    }
}

/// Send `Pump` on every poll tick (when polling) and every driver wake-up.
fn spawn_ticker(
    pool: ActorRef<PoolMessage>,
    waker: Arc<tokio::sync::Notify>,
    poll_interval: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = poll_interval.map(tokio::time::interval);
        loop {
            match interval.as_mut() {
                Some(interval) => {
                    tokio::select! {
                        _ = interval.tick() => {}
                        _ = waker.notified() => {}
                    }
                }
                None => waker.notified().await,
            }
            if pool.send_message(PoolMessage::Pump).is_err() {
                break;
            }
        }
    })
}

/// Claim jobs until the pool is full or nothing is ready.
async fn fill_slots(myself: &ActorRef<PoolMessage>, state: &mut PoolState) {
    while state.has_free_slot() {
        match state.driver.claim().await {
            Ok(Some(job)) => {
                state.active += 1;
                spawn_execution(myself.clone(), state, job);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim job");
                break;
            }
        }
    }
}

fn spawn_execution(pool: ActorRef<PoolMessage>, state: &PoolState, job: ClaimedJob) {
    let driver = state.driver.clone();
    let handlers = state.handlers.clone();
    let policy = state.config.retry;
    let timeout = state.config.job_timeout;

    tokio::spawn(async move {
        execute(driver.as_ref(), &handlers, policy, timeout, job).await;
        // The pool is gone once shutdown completes; nothing left to report to.
        let _ = pool.send_message(PoolMessage::JobFinished);
    });
}

/// Run one claimed job and settle its outcome with the driver.
async fn execute(
    driver: &dyn QueueDriver,
    handlers: &HandlerRegistry,
    policy: RetryPolicy,
    timeout: Option<Duration>,
    job: ClaimedJob,
) {
    let job_id = job.id;
    let kind = job.payload.kind();

    let Some(future) = handlers.dispatch(job.payload.clone()) else {
        tracing::warn!(job_id = %job_id, kind = %kind, "No handler registered, discarding job");
        if let Err(e) = driver.discard(job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to discard job");
        }
        return;
    };

    tracing::debug!(job_id = %job_id, kind = %kind, attempt = job.attempts + 1, "Running job");

    match run_handler(future, timeout).await {
        Ok(()) => match driver.complete(job_id).await {
            Ok(()) => tracing::debug!(job_id = %job_id, kind = %kind, "Job completed"),
            Err(e) => {
                tracing::error!(job_id = %job_id, kind = %kind, error = %e, "Failed to complete job")
            }
        },
        Err(message) => match driver.fail(job, message.clone(), policy).await {
            Ok(RetryDecision::Retry { attempts, delay }) => tracing::warn!(
                job_id = %job_id,
                kind = %kind,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %message,
                "Job failed, retrying"
            ),
            Ok(RetryDecision::GiveUp { attempts }) => tracing::error!(
                job_id = %job_id,
                kind = %kind,
                attempt = attempts,
                error = %message,
                "Job failed permanently"
            ),
            Err(e) => tracing::error!(
                job_id = %job_id,
                kind = %kind,
                error = %e,
                "Failed to record job failure"
            ),
        },
    }
}

/// Await a handler in its own task so a panic or a timeout becomes an error message.
async fn run_handler(future: HandlerFuture, timeout: Option<Duration>) -> Result<(), String> {
    let mut task = tokio::spawn(future);

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(format!("Job timed out after {}ms", limit.as_millis()));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("Job handler panicked: {detail}"))
        }
        Err(e) => Err(format!("Job handler was cancelled: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, HandlerResult};

    #[tokio::test]
    async fn handler_error_becomes_message() {
        let result = run_handler(
            Box::pin(async { Err::<(), HandlerError>("ledger closed".into()) }),
            None,
        )
        .await;
        assert_eq!(result, Err("ledger closed".to_string()));
    }

    async fn explode() -> HandlerResult {
        panic!("bad row")
    }

    #[tokio::test]
    async fn handler_panic_becomes_failure() {
        let result = run_handler(Box::pin(explode()), None).await;
        assert_eq!(result, Err("Job handler panicked: bad row".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let result = run_handler(
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<(), HandlerError>(())
            }),
            Some(Duration::from_millis(100)),
        )
        .await;
        assert_eq!(result, Err("Job timed out after 100ms".to_string()));
    }
}
