//! Bucket abstraction consumed by the scheduler and jobs.
//!
//! Backends list objects in lexicographic name order only. Nothing about the
//! listing order says anything about modification times, which is why the
//! scheduler reconciles each page against the checkpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::core::error::BucketError;

/// Attributes of a single bucket object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttrs {
    /// Full object name within the bucket.
    pub name: String,
    /// MIME content type reported by the backend.
    pub content_type: String,
    /// Last modification time.
    pub updated: DateTime<Utc>,
    /// Object size in bytes.
    pub size: u64,
}

impl ObjectAttrs {
    /// Build attributes for an object.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        updated: DateTime<Utc>,
        size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            updated,
            size,
        }
    }

    /// Directory markers are zero-content placeholders whose name ends in `/`.
    #[must_use]
    pub fn is_directory_marker(&self) -> bool {
        self.name.ends_with('/')
    }
}

impl AsRef<Self> for ObjectAttrs {
    fn as_ref(&self) -> &Self {
        self
    }
}

/// One page of a bucket listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page, in lexicographic name order.
    pub objects: Vec<ObjectAttrs>,
    /// Token for the following page, `None` when the listing is exhausted.
    pub next_page_token: Option<String>,
}

/// Streaming reader over an object's body.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// A cloud bucket that can be listed and read.
#[async_trait]
pub trait Bucket: Send + Sync + 'static {
    /// Bucket name.
    fn name(&self) -> &str;

    /// URI scheme used when building object URIs.
    fn scheme(&self) -> &str {
        "gs"
    }

    /// Fetch a page of at most `page_size` objects, starting at `page_token`.
    async fn list_page(
        &self,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, BucketError>;

    /// Fetch the current attributes of a single object.
    async fn attrs(&self, name: &str) -> Result<ObjectAttrs, BucketError>;

    /// Open the object body for reading.
    async fn open(&self, name: &str) -> Result<ObjectReader, BucketError>;
}

/// Build the URI of an object, e.g. `gs://bucket/path/to/object.json`.
pub fn object_uri(bucket: &dyn Bucket, name: &str) -> String {
    format!("{}://{}/{}", bucket.scheme(), bucket.name(), name)
}
