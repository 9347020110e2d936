#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actors::{HandlerError, HandlerRegistry, TaskQueue};
use chrono::Utc;
use common::{Counter, eventually, fast_config, surreal_db};
use db::DbError;
use db::repositories::JobRepository;
use serde_json::json;
use taskqueue_core::{
    AnalyticsKpiPayload, DriverKind, JobId, JobPayload, JobRecord, JobStatus, ListJobsOptions,
    OrderAccountingPayload, QueueError,
};

const WAIT: Duration = Duration::from_secs(10);

fn order(n: usize) -> OrderAccountingPayload {
    OrderAccountingPayload::new(format!("order-{n}"), "tenant-1")
}

/// Handlers where order-accounting fails with "boom" until `succeed_from` calls have been made.
fn flaky_handlers(calls: &Counter, succeed_from: usize) -> HandlerRegistry {
    let tally = calls.clone();
    let mut handlers = HandlerRegistry::new();
    handlers.register::<OrderAccountingPayload, _>(move |_: OrderAccountingPayload| {
        let attempt = tally.bump();
        async move {
            if attempt < succeed_from {
                Err::<(), HandlerError>("boom".into())
            } else {
                Ok(())
            }
        }
    });
    handlers
}

async fn failed_count(repo: &JobRepository) -> u64 {
    repo.counts().await.map(|c| c.failed).unwrap_or(0)
}

async fn is_empty(repo: &JobRepository) -> bool {
    repo.counts()
        .await
        .map(|c| c == Default::default())
        .unwrap_or(false)
}

#[tokio::test]
async fn successful_job_is_deleted() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());
    let calls = Counter::default();

    let queue = TaskQueue::surreal(fast_config(), db, flaky_handlers(&calls, 1)).await?;
    let id = queue.enqueue(order(1)).await?.ok_or("job was discarded")?;

    assert!(eventually(WAIT, || async { calls.get() == 1 && is_empty(&repo).await }).await);
    assert!(matches!(repo.get(id).await, Err(DbError::NotFound(_))));

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn exhausted_job_is_kept_as_failed() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());
    let calls = Counter::default();

    let config = fast_config().with_max_attempts(3);
    let queue = TaskQueue::surreal(config, db, flaky_handlers(&calls, usize::MAX)).await?;
    let id = queue.enqueue(order(1)).await?.ok_or("job was discarded")?;

    assert!(eventually(WAIT, || async { failed_count(&repo).await == 1 }).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.get(), 3);

    let record = repo.get(id).await?;
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.error_message.as_deref(), Some("boom"));
    assert!(record.available_at.is_none());
    assert!(record.locked_at.is_none());

    let listed = queue
        .list_jobs(ListJobsOptions::with_status(JobStatus::Failed))
        .await?;
    assert_eq!(listed.len(), 1);
    assert!(listed[0].supports_retry);

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn retry_resets_and_reruns_failed_job() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());
    let calls = Counter::default();

    let config = fast_config().with_max_attempts(2);
    let queue = TaskQueue::surreal(config, db, flaky_handlers(&calls, 3)).await?;
    let id = queue.enqueue(order(1)).await?.ok_or("job was discarded")?;

    assert!(eventually(WAIT, || async { failed_count(&repo).await == 1 }).await);
    assert_eq!(calls.get(), 2);

    let view = queue.retry_job(id).await?;
    assert_eq!(view.attempts, 0);
    assert!(view.error_message.is_none());

    assert!(eventually(WAIT, || async { is_empty(&repo).await }).await);
    assert_eq!(calls.get(), 3);

    assert!(matches!(
        queue.retry_job(id).await,
        Err(QueueError::NotFound(missing)) if missing == id
    ));

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stranded_active_jobs_are_recovered_on_start() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());

    // A previous process claimed these and died.
    for n in 0..2 {
        let payload: JobPayload = order(n).into();
        repo.create(&JobRecord::new(&payload)?).await?;
    }
    repo.claim_next().await?;
    repo.claim_next().await?;
    assert_eq!(repo.counts().await?.active, 2);

    let calls = Counter::default();
    let queue = TaskQueue::surreal(fast_config(), db, flaky_handlers(&calls, 1)).await?;

    assert!(eventually(WAIT, || async { calls.get() == 2 && is_empty(&repo).await }).await);

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_queues_never_run_the_same_job() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());
    let runs: Arc<Mutex<Vec<String>>> = Arc::default();

    let make_handlers = || {
        let runs = runs.clone();
        let mut handlers = HandlerRegistry::new();
        handlers.register::<OrderAccountingPayload, _>(move |payload: OrderAccountingPayload| {
            let runs = runs.clone();
            async move {
                runs.lock().unwrap().push(payload.order_id);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<(), HandlerError>(())
            }
        });
        handlers
    };

    let first = TaskQueue::surreal(fast_config().with_concurrency(3), db.clone(), make_handlers()).await?;
    let second = TaskQueue::surreal(fast_config().with_concurrency(3), db, make_handlers()).await?;

    for n in 0..20 {
        let queue = if n % 2 == 0 { &first } else { &second };
        queue.enqueue(order(n)).await?;
    }

    assert!(eventually(Duration::from_secs(20), || async { is_empty(&repo).await }).await);

    let mut runs = runs.lock().unwrap().clone();
    assert_eq!(runs.len(), 20);
    runs.sort();
    runs.dedup();
    assert_eq!(runs.len(), 20, "a job ran more than once");

    first.shutdown().await?;
    second.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn undecodable_payload_is_failed_without_running() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());

    let mut record = JobRecord::new(&order(1).into())?;
    record.payload = json!({ "orderId": 42 });
    let id = repo.create(&record).await?.id;

    let calls = Counter::default();
    let queue = TaskQueue::surreal(fast_config(), db, flaky_handlers(&calls, 1)).await?;

    assert!(eventually(WAIT, || async { failed_count(&repo).await == 1 }).await);
    assert_eq!(calls.get(), 0);

    let stored = repo.get(id).await?;
    assert!(
        stored
            .error_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Invalid payload"))
    );

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn unregistered_kind_never_reaches_the_store() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let calls = Counter::default();
    let queue = TaskQueue::surreal(fast_config(), db, flaky_handlers(&calls, 1)).await?;

    let id = queue
        .enqueue(AnalyticsKpiPayload::new("tenant-1"))
        .await?;
    assert!(id.is_none());
    assert!(queue.list_jobs(ListJobsOptions::default()).await?.is_empty());

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stored_job_without_handler_is_discarded() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());

    let record = JobRecord::new(&AnalyticsKpiPayload::new("tenant-1").into())?;
    let id = repo.create(&record).await?.id;

    let calls = Counter::default();
    let queue = TaskQueue::surreal(fast_config(), db, flaky_handlers(&calls, 1)).await?;

    assert!(eventually(WAIT, || async { is_empty(&repo).await }).await);
    assert!(matches!(repo.get(id).await, Err(DbError::NotFound(_))));
    assert_eq!(calls.get(), 0);

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn durable_retries_wait_out_the_backoff() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());

    let runs: Arc<Mutex<Vec<Instant>>> = Arc::default();
    let seen = runs.clone();
    let mut handlers = HandlerRegistry::new();
    handlers.register::<OrderAccountingPayload, _>(move |_: OrderAccountingPayload| {
        if let Ok(mut runs) = seen.lock() {
            runs.push(Instant::now());
        }
        async { Err::<(), HandlerError>("boom".into()) }
    });

    let base = Duration::from_millis(300);
    let config = fast_config().with_base_delay(base).with_max_attempts(3);
    let queue = TaskQueue::surreal(config, db, handlers).await?;
    let id = queue.enqueue(order(1)).await?.ok_or("job was discarded")?;

    assert!(eventually(WAIT, || async { failed_count(&repo).await == 1 }).await);

    let runs = runs.lock().map_err(|e| e.to_string())?.clone();
    assert_eq!(runs.len(), 3);
    let first_gap = runs[1] - runs[0];
    let second_gap = runs[2] - runs[1];
    // Stored times have millisecond resolution.
    assert!(first_gap >= base - Duration::from_millis(5), "{first_gap:?}");
    assert!(second_gap >= base * 2 - Duration::from_millis(5), "{second_gap:?}");
    assert!(second_gap > first_gap);

    let stored = repo.get(id).await?;
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 3);

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stats_and_listing_describe_the_store() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());
    let calls = Counter::default();

    let config = fast_config().with_max_attempts(1).with_concurrency(4);
    let queue = TaskQueue::surreal(config, db, flaky_handlers(&calls, usize::MAX)).await?;

    let stats = queue.stats().await?;
    assert_eq!(stats.driver, DriverKind::Surreal);
    assert!(stats.supports_persistence);
    assert_eq!(stats.concurrency, 4);
    assert_eq!(stats.max_attempts, 1);
    assert_eq!((stats.pending, stats.active, stats.failed), (0, 0, 0));
    assert!(stats.last_failure_at.is_none());

    let long_tenant = "t".repeat(100);
    queue
        .enqueue(OrderAccountingPayload::new("order-1", long_tenant.as_str()))
        .await?;
    assert!(eventually(WAIT, || async { failed_count(&repo).await == 1 }).await);

    let stats = queue.stats().await?;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.delayed, 0);
    assert!(stats.last_failure_at.is_some());
    assert!(stats.next_available_at.is_none());

    let jobs = queue.list_jobs(ListJobsOptions::default()).await?;
    assert_eq!(jobs.len(), 1);
    let summary = &jobs[0].payload_summary;
    assert_eq!(summary["orderId"], json!("order-1"));
    let tenant = summary["tenantId"].as_str().ok_or("tenant missing")?;
    assert_eq!(tenant.len(), 80);
    assert!(tenant.ends_with("..."));

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn purge_only_removes_old_failures() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());
    let calls = Counter::default();

    let config = fast_config().with_max_attempts(1);
    let queue = TaskQueue::surreal(config, db, flaky_handlers(&calls, usize::MAX)).await?;

    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(queue.enqueue(order(n)).await?.ok_or("job was discarded")?);
    }
    assert!(eventually(WAIT, || async { failed_count(&repo).await == 3 }).await);

    let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
    common::age_job(repo.db(), ids[0], two_hours_ago).await?;
    common::age_job(repo.db(), ids[1], two_hours_ago).await?;

    assert_eq!(queue.purge_jobs(JobStatus::Failed, Some(60)).await?, 2);
    assert_eq!(failed_count(&repo).await, 1);
    assert!(repo.get(ids[2]).await.is_ok());

    // Zero means "no age filter".
    assert_eq!(queue.purge_jobs(JobStatus::Failed, Some(0)).await?, 1);
    assert!(is_empty(&repo).await);

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn delete_reports_missing_jobs() -> Result<(), Box<dyn Error>> {
    let db = surreal_db().await?;
    let repo = JobRepository::new(db.clone());
    let calls = Counter::default();

    let config = fast_config().with_max_attempts(1);
    let queue = TaskQueue::surreal(config, db, flaky_handlers(&calls, usize::MAX)).await?;
    let id = queue.enqueue(order(1)).await?.ok_or("job was discarded")?;
    assert!(eventually(WAIT, || async { failed_count(&repo).await == 1 }).await);

    queue.delete_job(id).await?;
    assert!(is_empty(&repo).await);
    assert!(matches!(
        queue.delete_job(id).await,
        Err(QueueError::NotFound(_))
    ));
    assert!(matches!(
        queue.delete_job(JobId::new()).await,
        Err(QueueError::NotFound(_))
    ));

    queue.shutdown().await?;
    Ok(())
}
