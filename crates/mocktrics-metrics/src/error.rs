//! Error types for metric and scheduler operations.

use mocktrics_core::InvalidParameter;
use thiserror::Error;

/// Result type alias for metric operations.
pub type MetricResult<T> = Result<T, MetricError>;

/// Errors raised by the metric model. All of them are recoverable; the API
/// layer maps each variant to its own response status.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("metric values can not have duplicate labelsets")]
    DuplicateLabelset,

    #[error("value label count {actual} does not match metric label count {expected}")]
    LabelCountMismatch { expected: usize, actual: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("read-only: {0}")]
    ReadOnly(String),

    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameter),

    #[error("metric already exists: {0}")]
    AlreadyExists(String),

    #[error("exporter error: {0}")]
    Export(String),
}

impl MetricError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        MetricError::Validation {
            field,
            reason: reason.into(),
        }
    }
}
