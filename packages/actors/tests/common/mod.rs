#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use db::{Database, DbConfig, DbError};
use taskqueue_core::{JobId, QueueConfig};

/// Config with instant retries and a fast poll, for tests that run on the wall clock.
pub fn fast_config() -> QueueConfig {
    QueueConfig::default()
        .with_base_delay(Duration::ZERO)
        .with_poll_interval(Duration::from_millis(20))
}

/// A fresh in-memory SurrealDB with the schema applied.
pub async fn surreal_db() -> Result<Database, DbError> {
    db::init(&DbConfig::memory()).await
}

/// Backdate a record's `updated_at`.
pub async fn age_job(db: &Database, id: JobId, at: DateTime<Utc>) -> Result<(), DbError> {
    db.query(r#"UPDATE type::thing("task_queue_job", $id) SET updated_at = $at"#)
        .bind(("id", id.to_string()))
        .bind(("at", at.timestamp_millis()))
        .await?
        .check()?;
    Ok(())
}

/// Poll `check` every 10ms until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Shared call counter for handlers.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    /// Increment and return the new count.
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
