//! Admin service and startup wiring for the task queue.
//!
//! This crate contains:
//! - Admin operations (stats, listing, retry, delete, purge) with input
//!   validation and HTTP-style error codes
//! - Queue initialization from environment configuration

mod admin;
mod error;
mod init;

pub use admin::{
    AdminApi, DeleteJobResponse, ListJobsRequest, ListJobsResponse, PurgeJobsRequest,
    PurgeJobsResponse, parse_status_filter,
};
pub use error::{ApiError, ErrorBody};
pub use init::{demo_handlers, init_task_queue, init_task_queue_with};

// Re-export core types for convenience
pub use taskqueue_core::{JobId, JobStatus, JobView, QueueConfig, QueueStats};
