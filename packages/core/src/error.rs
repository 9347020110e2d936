//! Error type shared by every queue surface.

use thiserror::Error;

use crate::{DriverKind, JobId};

/// Errors surfaced by queue, driver and admin operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The operation needs a capability the active driver lacks.
    #[error("{operation} is not supported by the {driver} driver")]
    Unsupported {
        operation: &'static str,
        driver: DriverKind,
    },

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("queue is shutting down")]
    ShuttingDown,

    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid job status: {0}")]
    InvalidStatus(String),

    #[error("unknown job kind: {0}")]
    UnknownKind(String),

    #[error("invalid job id: {0}")]
    InvalidJobId(String),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl QueueError {
    pub fn unsupported(operation: &'static str, driver: DriverKind) -> Self {
        QueueError::Unsupported { operation, driver }
    }
}

impl From<ulid::DecodeError> for QueueError {
    fn from(err: ulid::DecodeError) -> Self {
        QueueError::InvalidJobId(err.to_string())
    }
}
