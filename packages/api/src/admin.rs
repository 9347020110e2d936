//! Admin operations over a running task queue.
//!
//! Inputs arrive as loosely typed request values (query strings, JSON
//! bodies) and are validated here before reaching the queue.

use std::sync::Arc;

use actors::TaskQueue;
use serde::{Deserialize, Serialize};
use taskqueue_core::{JobId, JobStatus, JobView, ListJobsOptions, QueueStats};

use crate::ApiError;

/// Request type for listing jobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsRequest {
    /// `pending`, `active`, `failed`, or `all`/absent for every status.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsResponse {
    pub jobs: Vec<JobView>,
}

/// Request type for a bulk purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeJobsRequest {
    pub status: String,
    #[serde(default)]
    pub older_than_minutes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeJobsResponse {
    pub success: bool,
    pub deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteJobResponse {
    pub success: bool,
}

/// Normalize an optional status filter. `all`, blank or absent mean no filter.
pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<JobStatus>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => parse_status(s).map(Some),
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, ApiError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<JobStatus>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid status: {raw}")))
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw.trim()).map_err(|e| ApiError::BadRequest(format!("Invalid job ID: {e}")))
}

/// Admin service for one queue.
#[derive(Clone)]
pub struct AdminApi {
    queue: Arc<TaskQueue>,
}

impl AdminApi {
    pub fn new(queue: Arc<TaskQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub async fn stats(&self) -> Result<QueueStats, ApiError> {
        Ok(self.queue.stats().await?)
    }

    pub async fn list_jobs(&self, request: ListJobsRequest) -> Result<ListJobsResponse, ApiError> {
        let options = ListJobsOptions {
            status: parse_status_filter(request.status.as_deref())?,
            limit: request.limit,
            skip: request.skip,
        };
        let jobs = self.queue.list_jobs(options).await?;
        Ok(ListJobsResponse { jobs })
    }

    pub async fn retry_job(&self, id: &str) -> Result<JobView, ApiError> {
        let id = parse_job_id(id)?;
        Ok(self.queue.retry_job(id).await?)
    }

    pub async fn delete_job(&self, id: &str) -> Result<DeleteJobResponse, ApiError> {
        let id = parse_job_id(id)?;
        self.queue.delete_job(id).await?;
        Ok(DeleteJobResponse { success: true })
    }

    pub async fn purge_jobs(&self, request: PurgeJobsRequest) -> Result<PurgeJobsResponse, ApiError> {
        let status = parse_status(&request.status)?;
        let deleted = self
            .queue
            .purge_jobs(status, request.older_than_minutes)
            .await?;
        Ok(PurgeJobsResponse {
            success: true,
            deleted,
        })
    }
}
