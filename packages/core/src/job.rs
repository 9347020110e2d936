//! Job domain types for work items in the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::payload::JobPayload;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted status of a job record.
///
/// Successful jobs are deleted rather than kept, so there is no completed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting until `available_at` passes and a worker claims it.
    #[default]
    Pending,
    /// Claimed by a worker and currently executing.
    Active,
    /// Attempts exhausted. Only an admin retry or delete moves it.
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 3] = [JobStatus::Pending, JobStatus::Active, JobStatus::Failed];

    /// Get a simple status string for display and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "active",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "active" => Ok(JobStatus::Active),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::QueueError::InvalidStatus(other.to_string())),
        }
    }
}

/// A job record as held by the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    /// Wire name of the job kind. Kept as a string so records written by
    /// other releases still load.
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    #[serde(default)]
    pub attempts: u32,
    pub available_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a new pending record, immediately available.
    pub fn new(payload: &JobPayload) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            kind: payload.kind().as_str().to_string(),
            payload: payload.to_value()?,
            status: JobStatus::Pending,
            attempts: 0,
            available_at: Some(now),
            locked_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decode the stored kind + payload back into the typed payload.
    pub fn decode_payload(&self) -> Result<JobPayload, serde_json::Error> {
        JobPayload::from_parts(&self.kind, self.payload.clone())
    }
}

/// A job handed out by a driver to the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
    pub id: JobId,
    pub payload: JobPayload,
    /// Attempts already made before this execution.
    pub attempts: u32,
}

impl ClaimedJob {
    pub fn new(id: JobId, payload: JobPayload, attempts: u32) -> Self {
        Self {
            id,
            payload,
            attempts,
        }
    }
}
