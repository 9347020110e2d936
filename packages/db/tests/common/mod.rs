use chrono::{DateTime, Utc};
use db::{DbConfig, DbError, repositories::JobRepository};
use taskqueue_core::JobId;

/// A repository over a fresh in-memory database, schema applied.
pub async fn setup_repo() -> Result<JobRepository, DbError> {
    let db = db::init(&DbConfig::memory()).await?;
    Ok(JobRepository::new(db))
}

/// Backdate a record's `updated_at`.
pub async fn age_job(repo: &JobRepository, id: JobId, at: DateTime<Utc>) -> Result<(), DbError> {
    repo.db()
        .query(r#"UPDATE type::thing("task_queue_job", $id) SET updated_at = $at"#)
        .bind(("id", id.to_string()))
        .bind(("at", at.timestamp_millis()))
        .await?
        .check()?;
    Ok(())
}
