//! Read models served to the admin surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DriverKind, JobId, JobRecord, JobStatus};

/// Default page size of a job listing.
pub const DEFAULT_LIST_LIMIT: usize = 25;

/// Strings longer than this are cut in payload summaries.
const SUMMARY_MAX_CHARS: usize = 80;
const SUMMARY_KEEP_CHARS: usize = 77;

/// Statistics for the queue's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub driver: DriverKind,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub pending: u64,
    pub active: u64,
    pub failed: u64,
    /// Jobs waiting on an in-process backoff timer. Always 0 for the durable driver,
    /// where delayed jobs are counted as pending.
    pub delayed: u64,
    /// When the oldest pending job becomes eligible.
    pub next_available_at: Option<DateTime<Utc>>,
    /// When the most recent terminal failure was recorded.
    pub last_failure_at: Option<DateTime<Utc>>,
    pub supports_persistence: bool,
}

/// Filter and page options for listing jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListJobsOptions {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl ListJobsOptions {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Page size, falling back to [`DEFAULT_LIST_LIMIT`] when absent or zero.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_LIST_LIMIT,
        }
    }

    pub fn effective_skip(&self) -> usize {
        self.skip.unwrap_or(0)
    }
}

/// A job as shown in admin listings, with a redacted payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: JobId,
    pub kind: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub available_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload_summary: Map<String, Value>,
    pub supports_retry: bool,
}

impl From<JobRecord> for JobView {
    fn from(record: JobRecord) -> Self {
        Self {
            id: record.id,
            payload_summary: summarize_payload(&record.payload),
            supports_retry: record.status == JobStatus::Failed,
            kind: record.kind,
            status: record.status,
            attempts: record.attempts,
            available_at: record.available_at,
            locked_at: record.locked_at,
            error_message: record.error_message,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Summarize a payload object for display.
///
/// Long strings are truncated, scalars pass through, nested arrays and
/// objects collapse to a size descriptor. Non-object payloads summarize
/// to an empty map.
pub fn summarize_payload(payload: &Value) -> Map<String, Value> {
    let Value::Object(fields) = payload else {
        return Map::new();
    };

    fields
        .iter()
        .map(|(key, value)| {
            let summary = match value {
                Value::String(s) if s.chars().count() > SUMMARY_MAX_CHARS => {
                    let kept: String = s.chars().take(SUMMARY_KEEP_CHARS).collect();
                    Value::String(format!("{kept}..."))
                }
                Value::Array(items) => Value::String(format!("[{} items]", items.len())),
                Value::Object(inner) => Value::String(format!("{{{} keys}}", inner.len())),
                scalar => scalar.clone(),
            };
            (key.clone(), summary)
        })
        .collect()
}
