//! Error types for bucket shipping operations.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a bucket backend.
#[derive(Debug, Error)]
pub enum BucketError {
    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
    /// Listing the bucket failed.
    #[error("listing failed: {0}")]
    Listing(String),
    /// Reading object data or attributes failed.
    #[error("read failed: {0}")]
    Read(String),
}

/// Errors returned by a downstream publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The publisher rejected the event.
    #[error("event rejected: {0}")]
    Rejected(String),
    /// The publisher has been closed.
    #[error("publisher closed")]
    Closed,
}

/// Errors produced while scheduling and processing bucket objects.
#[derive(Debug, Error)]
pub enum ShipperError {
    /// A page of the bucket listing could not be fetched.
    #[error("listing bucket `{bucket}` failed: {source}")]
    Listing {
        /// Bucket being listed.
        bucket: String,
        /// Underlying backend error.
        #[source]
        source: BucketError,
    },
    /// An operation exceeded its time bound.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Configured time bound.
        timeout: Duration,
    },
    /// Object data could not be read.
    #[error("reading object `{object}` failed: {reason}")]
    Read {
        /// Object name.
        object: String,
        /// Failure description.
        reason: String,
    },
    /// Object content could not be decoded.
    #[error("decoding object `{object}` failed: {reason}")]
    Decode {
        /// Object name.
        object: String,
        /// Failure description.
        reason: String,
    },
    /// Object content type is not handled.
    #[error("content-type {0} not supported")]
    UnsupportedContentType(String),
    /// Publishing an event failed.
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    /// The worker pool refused or lost a job.
    #[error("worker pool: {0}")]
    Pool(#[from] crate::core::worker_pool::PoolError),
    /// Configuration was invalid.
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    /// Work was cancelled through the shared context.
    #[error("cancelled")]
    Cancelled,
}

impl ShipperError {
    /// Returns true when the error only reflects cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Pool(crate::core::worker_pool::PoolError::Cancelled)
        )
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
