//! Job repository: the persistent side of the durable queue driver.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskqueue_core::{JobId, JobRecord, JobStatus, ListJobsOptions, RetryDecision};

use crate::{Database, DbError, JOB_TABLE};

/// Repository for job persistence operations.
///
/// Holds a clone of the connection handle, so any number of repositories
/// (and queue instances) can share one database.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

/// Per-status record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: u64,
    pub active: u64,
    pub failed: u64,
}

/// Record shape in the `task_queue_job` table.
///
/// Timestamps are epoch milliseconds so SurrealDB compares and sorts them
/// numerically. `None` fields are left out on write, which stores `NONE`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredJob {
    job_id: String,
    kind: String,
    payload: serde_json::Value,
    status: JobStatus,
    #[serde(default)]
    attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    available_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locked_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<&JobRecord> for StoredJob {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id.to_string(),
            kind: record.kind.clone(),
            payload: record.payload.clone(),
            status: record.status,
            attempts: record.attempts,
            available_at: record.available_at.map(|at| at.timestamp_millis()),
            locked_at: record.locked_at.map(|at| at.timestamp_millis()),
            error_message: record.error_message.clone(),
            created_at: record.created_at.timestamp_millis(),
            updated_at: record.updated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<StoredJob> for JobRecord {
    type Error = DbError;

    fn try_from(stored: StoredJob) -> Result<Self, Self::Error> {
        let id = JobId::parse(&stored.job_id)
            .map_err(|e| DbError::Serialization(format!("job id {}: {e}", stored.job_id)))?;

        Ok(JobRecord {
            id,
            kind: stored.kind,
            payload: stored.payload,
            status: stored.status,
            attempts: stored.attempts,
            available_at: stored.available_at.map(from_millis).transpose()?,
            locked_at: stored.locked_at.map(from_millis).transpose()?,
            error_message: stored.error_message,
            created_at: from_millis(stored.created_at)?,
            updated_at: from_millis(stored.updated_at)?,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DbError::Serialization(format!("timestamp out of range: {ms}")))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Latest instant chrono can represent, in epoch milliseconds.
fn latest_millis() -> i64 {
    DateTime::<Utc>::MAX_UTC.timestamp_millis()
}

/// `now + delay`, clamped so the stored value always reads back as a timestamp.
fn available_after(now: i64, delay: Duration) -> i64 {
    now.saturating_add(duration_millis(delay)).min(latest_millis())
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn single(stored: Vec<StoredJob>, id: JobId) -> Result<JobRecord, DbError> {
    stored
        .into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound(format!("Job not found: {id}")))?
        .try_into()
}

fn into_records(stored: Vec<StoredJob>) -> Result<Vec<JobRecord>, DbError> {
    stored.into_iter().map(JobRecord::try_from).collect()
}

/// Attempts to claim before giving up when other pollers keep winning.
const CLAIM_CANDIDATES: usize = 5;

const SELECT_NEXT_READY: &str = r#"
    SELECT * FROM task_queue_job
    WHERE status = "pending" AND available_at != NONE AND available_at <= $now
    ORDER BY available_at ASC, created_at ASC, job_id ASC
    LIMIT 1
"#;

const CLAIM_IF_PENDING: &str = r#"
    UPDATE type::thing("task_queue_job", $id)
    SET status = "active", locked_at = $now, updated_at = $now
    WHERE status = "pending"
    RETURN AFTER
"#;

const RESCHEDULE: &str = r#"
    UPDATE type::thing("task_queue_job", $id)
    SET status = "pending",
        attempts = $attempts,
        locked_at = NONE,
        available_at = $available_at,
        error_message = $message,
        updated_at = $now
    RETURN AFTER
"#;

const GIVE_UP: &str = r#"
    UPDATE type::thing("task_queue_job", $id)
    SET status = "failed",
        attempts = $attempts,
        locked_at = NONE,
        available_at = NONE,
        error_message = $message,
        updated_at = $now
    RETURN AFTER
"#;

const MARK_FAILED: &str = r#"
    UPDATE type::thing("task_queue_job", $id)
    SET status = "failed",
        attempts += 1,
        locked_at = NONE,
        available_at = NONE,
        error_message = $message,
        updated_at = $now
    RETURN AFTER
"#;

const RECOVER_ACTIVE: &str = r#"
    UPDATE task_queue_job
    SET status = "pending", locked_at = NONE, available_at = $now, updated_at = $now
    WHERE status = "active"
    RETURN AFTER
"#;

const RESET_FOR_RETRY: &str = r#"
    UPDATE type::thing("task_queue_job", $id)
    SET status = "pending",
        attempts = 0,
        locked_at = NONE,
        error_message = NONE,
        available_at = $now,
        updated_at = $now
    RETURN AFTER
"#;

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying connection.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Insert a new job record.
    pub async fn create(&self, record: &JobRecord) -> Result<JobRecord, DbError> {
        let stored: Option<StoredJob> = self
            .db
            .create((JOB_TABLE, record.id.to_string()))
            .content(StoredJob::from(record))
            .await?;

        stored
            .ok_or_else(|| DbError::Query("Failed to create job".into()))?
            .try_into()
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<JobRecord, DbError> {
        let stored: Option<StoredJob> = self.db.select((JOB_TABLE, id.to_string())).await?;

        stored
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {id}")))?
            .try_into()
    }

    /// Claim the next ready job, moving it from `pending` to `active`.
    ///
    /// The update only applies while the record is still pending, so a
    /// record can be claimed by at most one caller even when several
    /// processes poll the same table. Returns `None` when nothing is ready.
    pub async fn claim_next(&self) -> Result<Option<JobRecord>, DbError> {
        for _ in 0..CLAIM_CANDIDATES {
            let now = now_millis();

            let mut response = self.db.query(SELECT_NEXT_READY).bind(("now", now)).await?;
            let candidates: Vec<StoredJob> = response.take(0)?;
            let Some(candidate) = candidates.into_iter().next() else {
                return Ok(None);
            };

            let mut response = self
                .db
                .query(CLAIM_IF_PENDING)
                .bind(("id", candidate.job_id.clone()))
                .bind(("now", now))
                .await?;
            let claimed: Vec<StoredJob> = response.take(0)?;

            match claimed.into_iter().next() {
                Some(stored) => return stored.try_into().map(Some),
                None => {
                    tracing::debug!(job_id = %candidate.job_id, "Job claimed elsewhere, trying next");
                }
            }
        }

        Ok(None)
    }

    /// Delete a finished job. Returns whether a record was removed.
    pub async fn complete(&self, id: JobId) -> Result<bool, DbError> {
        let removed: Option<StoredJob> = self.db.delete((JOB_TABLE, id.to_string())).await?;
        Ok(removed.is_some())
    }

    /// Delete a job, failing when it does not exist.
    pub async fn delete(&self, id: JobId) -> Result<(), DbError> {
        if self.complete(id).await? {
            Ok(())
        } else {
            Err(DbError::NotFound(format!("Job not found: {id}")))
        }
    }

    /// Persist the outcome of a failed execution.
    pub async fn record_failure(
        &self,
        id: JobId,
        decision: RetryDecision,
        message: &str,
    ) -> Result<JobRecord, DbError> {
        let now = now_millis();

        let query = match decision {
            RetryDecision::Retry { attempts, delay } => self
                .db
                .query(RESCHEDULE)
                .bind(("attempts", attempts))
                .bind(("available_at", available_after(now, delay))),
            RetryDecision::GiveUp { attempts } => {
                self.db.query(GIVE_UP).bind(("attempts", attempts))
            }
        };

        let mut response = query
            .bind(("id", id.to_string()))
            .bind(("message", message.to_string()))
            .bind(("now", now))
            .await?;

        single(response.take(0)?, id)
    }

    /// Move a job straight to `failed`, bypassing the retry policy.
    pub async fn mark_failed(&self, id: JobId, message: &str) -> Result<JobRecord, DbError> {
        let mut response = self
            .db
            .query(MARK_FAILED)
            .bind(("id", id.to_string()))
            .bind(("message", message.to_string()))
            .bind(("now", now_millis()))
            .await?;

        single(response.take(0)?, id)
    }

    /// Return every `active` record to `pending`, available now.
    pub async fn recover_active(&self) -> Result<usize, DbError> {
        let mut response = self
            .db
            .query(RECOVER_ACTIVE)
            .bind(("now", now_millis()))
            .await?;
        let recovered: Vec<StoredJob> = response.take(0)?;
        Ok(recovered.len())
    }

    /// Reset a job for a fresh run: pending, zero attempts, available now.
    pub async fn retry(&self, id: JobId) -> Result<JobRecord, DbError> {
        let mut response = self
            .db
            .query(RESET_FOR_RETRY)
            .bind(("id", id.to_string()))
            .bind(("now", now_millis()))
            .await?;

        single(response.take(0)?, id)
    }

    /// Count records per status.
    pub async fn counts(&self) -> Result<JobCounts, DbError> {
        #[derive(Deserialize)]
        struct StatusCount {
            status: JobStatus,
            count: u64,
        }

        let mut response = self
            .db
            .query("SELECT status, count() AS count FROM task_queue_job GROUP BY status")
            .await?;
        let rows: Vec<StatusCount> = response.take(0)?;

        let mut counts = JobCounts::default();
        for row in rows {
            match row.status {
                JobStatus::Pending => counts.pending = row.count,
                JobStatus::Active => counts.active = row.count,
                JobStatus::Failed => counts.failed = row.count,
            }
        }
        Ok(counts)
    }

    /// When the earliest pending job becomes eligible.
    pub async fn next_available_at(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        #[derive(Deserialize)]
        struct Row {
            available_at: Option<i64>,
        }

        let mut response = self
            .db
            .query(
                r#"
                SELECT available_at FROM task_queue_job
                WHERE status = "pending" AND available_at != NONE
                ORDER BY available_at ASC
                LIMIT 1
                "#,
            )
            .await?;
        let rows: Vec<Row> = response.take(0)?;

        rows.into_iter()
            .next()
            .and_then(|row| row.available_at)
            .map(from_millis)
            .transpose()
    }

    /// When the most recent terminal failure was recorded.
    pub async fn last_failure_at(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        #[derive(Deserialize)]
        struct Row {
            updated_at: i64,
        }

        let mut response = self
            .db
            .query(
                r#"
                SELECT updated_at FROM task_queue_job
                WHERE status = "failed"
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
            )
            .await?;
        let rows: Vec<Row> = response.take(0)?;

        rows.into_iter()
            .next()
            .map(|row| from_millis(row.updated_at))
            .transpose()
    }

    /// List jobs, optionally filtered by status.
    ///
    /// Ordered by status, then earliest availability, then most recently
    /// touched.
    pub async fn list(&self, options: &ListJobsOptions) -> Result<Vec<JobRecord>, DbError> {
        let where_clause = if options.status.is_some() {
            "WHERE status = $status"
        } else {
            ""
        };

        let query = format!(
            "SELECT * FROM task_queue_job {} \
             ORDER BY status ASC, available_at ASC, updated_at DESC, created_at DESC \
             LIMIT {} START {}",
            where_clause,
            options.effective_limit(),
            options.effective_skip()
        );

        let mut request = self.db.query(query);
        if let Some(status) = options.status {
            request = request.bind(("status", status.as_str()));
        }

        let mut response = request.await?;
        into_records(response.take(0)?)
    }

    /// Delete every record with `status`, optionally only those last
    /// updated at least `older_than` ago. Returns the number deleted.
    pub async fn purge(
        &self,
        status: JobStatus,
        older_than: Option<Duration>,
    ) -> Result<usize, DbError> {
        let mut request = match older_than {
            Some(age) => self
                .db
                .query(
                    "DELETE task_queue_job WHERE status = $status AND updated_at <= $threshold RETURN BEFORE",
                )
                .bind(("threshold", now_millis().saturating_sub(duration_millis(age)))),
            None => self
                .db
                .query("DELETE task_queue_job WHERE status = $status RETURN BEFORE"),
        };
        request = request.bind(("status", status.as_str()));

        let mut response = request.await?;
        let deleted: Vec<StoredJob> = response.take(0)?;
        Ok(deleted.len())
    }
}
