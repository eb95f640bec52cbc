//! Error types for storage calls and bucket reclamation

use serde::Serialize;
use std::time::Duration;

/// Result alias used by the reclamation layer
pub type Result<T> = std::result::Result<T, ReclaimError>;

/// Result of a single storage API call
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error code S3 reports for per-object denials, including object-lock refusals
pub const ACCESS_DENIED: &str = "AccessDenied";

/// A failed storage API call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{operation} failed{}: {message}", code_suffix(.code))]
pub struct ApiError {
    /// Operation name as declared in the client's operation set
    pub operation: &'static str,
    /// Service error code (`NoSuchBucket`, `AccessDenied`, ...), when the service sent one
    pub code: Option<String>,
    pub message: String,
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

impl ApiError {
    pub fn new(operation: &'static str, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            operation,
            code,
            message: message.into(),
        }
    }

    /// Shorthand for an error carrying a service error code
    pub fn with_code(operation: &'static str, code: &str, message: impl Into<String>) -> Self {
        Self::new(operation, Some(code.to_string()), message)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

/// Errors surfaced by bucket and namespace reclamation
#[derive(Debug, thiserror::Error)]
pub enum ReclaimError {
    #[error("failed to list buckets")]
    ListBuckets(#[source] ApiError),

    #[error("failed to list object versions in bucket {bucket}")]
    Listing {
        bucket: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to delete object versions in bucket {bucket}")]
    Delete {
        bucket: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to delete bucket {bucket}")]
    BucketDelete {
        bucket: String,
        #[source]
        source: ApiError,
    },

    /// The longest retention hold outlives the wait bound
    #[error(
        "bucket {bucket} still has objects locked for {} more seconds, not waiting for bucket cleanup",
        .remaining.as_secs_f64()
    )]
    UnresolvedRetention { bucket: String, remaining: Duration },

    #[error("batch size must be between 1 and {max}, got {size}")]
    InvalidBatchSize { size: usize, max: usize },
}

impl ReclaimError {
    /// Bucket the error is attributed to, if any
    pub fn bucket(&self) -> Option<&str> {
        match self {
            ReclaimError::Listing { bucket, .. }
            | ReclaimError::Delete { bucket, .. }
            | ReclaimError::BucketDelete { bucket, .. }
            | ReclaimError::UnresolvedRetention { bucket, .. } => Some(bucket),
            ReclaimError::ListBuckets(_) | ReclaimError::InvalidBatchSize { .. } => None,
        }
    }

    /// Underlying storage API error, if the failure came from a call
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ReclaimError::ListBuckets(source)
            | ReclaimError::Listing { source, .. }
            | ReclaimError::Delete { source, .. }
            | ReclaimError::BucketDelete { source, .. } => Some(source),
            ReclaimError::UnresolvedRetention { .. } | ReclaimError::InvalidBatchSize { .. } => None,
        }
    }
}
