//! Admin-facing error type with HTTP-style status codes.

use serde::Serialize;
use taskqueue_core::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

/// Serializable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status_code(),
            message: self.to_string(),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Unsupported { .. }
            | QueueError::InvalidStatus(_)
            | QueueError::UnknownKind(_)
            | QueueError::InvalidJobId(_)
            | QueueError::Payload(_) => ApiError::BadRequest(err.to_string()),
            QueueError::NotFound(_) => ApiError::NotFound(err.to_string()),
            QueueError::ShuttingDown | QueueError::Pool(_) | QueueError::Storage(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskqueue_core::{DriverKind, JobId};

    #[test]
    fn queue_errors_map_to_status_codes() {
        let unsupported: ApiError = QueueError::unsupported("stats", DriverKind::Memory).into();
        assert_eq!(unsupported.status_code(), 400);

        let missing: ApiError = QueueError::NotFound(JobId::new()).into();
        assert_eq!(missing.status_code(), 404);

        let storage: ApiError = QueueError::Storage("disk full".into()).into();
        assert_eq!(storage.status_code(), 500);
        assert_eq!(storage.body().message, "storage error: disk full");
    }
}
