//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Table holding one record per queued job.
pub const JOB_TABLE: &str = "task_queue_job";

/// Initialize the database schema.
///
/// Idempotent: every definition uses `IF NOT EXISTS`.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(JOB_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema. Timestamps are epoch milliseconds.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS task_queue_job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_id ON task_queue_job TYPE string;
DEFINE FIELD IF NOT EXISTS kind ON task_queue_job TYPE string;
DEFINE FIELD IF NOT EXISTS payload ON task_queue_job FLEXIBLE TYPE object;
DEFINE FIELD IF NOT EXISTS status ON task_queue_job TYPE string
    ASSERT $value IN ["pending", "active", "failed"];
DEFINE FIELD IF NOT EXISTS attempts ON task_queue_job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS available_at ON task_queue_job TYPE option<int>;
DEFINE FIELD IF NOT EXISTS locked_at ON task_queue_job TYPE option<int>;
DEFINE FIELD IF NOT EXISTS error_message ON task_queue_job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created_at ON task_queue_job TYPE int;
DEFINE FIELD IF NOT EXISTS updated_at ON task_queue_job TYPE int;

DEFINE INDEX IF NOT EXISTS task_queue_job_id ON task_queue_job FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS task_queue_job_ready ON task_queue_job FIELDS status, available_at;
DEFINE INDEX IF NOT EXISTS task_queue_job_updated ON task_queue_job FIELDS status, updated_at;
"#;
