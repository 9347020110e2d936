#![allow(clippy::disallowed_methods)]

use std::error::Error;
use std::time::Duration;

use actors::{HandlerError, HandlerRegistry};
use api::{AdminApi, ListJobsRequest, PurgeJobsRequest, init_task_queue_with};
use db::DbConfig;
use taskqueue_core::{DriverKind, JobStatus, OrderAccountingPayload, QueueConfig};

fn failing_handlers() -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();
    handlers.register::<OrderAccountingPayload, _>(|_: OrderAccountingPayload| async {
        Err::<(), HandlerError>("ledger closed".into())
    });
    handlers
}

fn durable_config() -> QueueConfig {
    QueueConfig::default()
        .with_driver(DriverKind::Surreal)
        .with_max_attempts(1)
        .with_poll_interval(Duration::from_millis(20))
}

async fn wait_for_failures(admin: &AdminApi, expected: u64) -> Result<(), Box<dyn Error>> {
    for _ in 0..500 {
        if admin.stats().await?.failed == expected {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Err(format!("expected {expected} failed jobs").into())
}

#[tokio::test]
async fn memory_driver_rejects_admin_with_bad_request() -> Result<(), Box<dyn Error>> {
    let queue =
        init_task_queue_with(QueueConfig::default(), DbConfig::memory(), HandlerRegistry::new())
            .await?;
    let admin = AdminApi::new(queue.clone());

    let err = admin.stats().await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    let err = admin.list_jobs(ListJobsRequest::default()).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    queue.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn durable_admin_round_trip() -> Result<(), Box<dyn Error>> {
    let queue = init_task_queue_with(durable_config(), DbConfig::memory(), failing_handlers()).await?;
    let admin = AdminApi::new(queue.clone());

    let first = queue
        .enqueue(OrderAccountingPayload::new("order-1", "tenant-1"))
        .await?
        .ok_or("discarded")?;
    queue
        .enqueue(OrderAccountingPayload::new("order-2", "tenant-1"))
        .await?;
    wait_for_failures(&admin, 2).await?;

    let listed = admin
        .list_jobs(ListJobsRequest {
            status: Some("all".into()),
            ..Default::default()
        })
        .await?;
    assert_eq!(listed.jobs.len(), 2);
    assert!(listed.jobs.iter().all(|job| job.status == JobStatus::Failed));

    let bad = admin
        .list_jobs(ListJobsRequest {
            status: Some("finished".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(bad.status_code(), 400);

    assert_eq!(admin.retry_job("not-an-id").await.unwrap_err().status_code(), 400);
    let missing = taskqueue_core::JobId::new().to_string();
    assert_eq!(admin.delete_job(&missing).await.unwrap_err().status_code(), 404);

    let deleted = admin.delete_job(&first.to_string()).await?;
    assert!(deleted.success);

    let purged = admin
        .purge_jobs(PurgeJobsRequest {
            status: "failed".into(),
            older_than_minutes: None,
        })
        .await?;
    assert!(purged.success);
    assert_eq!(purged.deleted, 1);
    assert_eq!(admin.stats().await?.failed, 0);

    let bad_purge = admin
        .purge_jobs(PurgeJobsRequest {
            status: "all".into(),
            older_than_minutes: None,
        })
        .await
        .unwrap_err();
    assert_eq!(bad_purge.status_code(), 400);

    queue.shutdown().await?;
    Ok(())
}
