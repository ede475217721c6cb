//! `object_store`-backed bucket, with a Google Cloud Storage constructor.
//!
//! Paging relies on the backend listing in lexicographic order, which GCS
//! and S3 both do. The page token is the last name returned.
//!
//! Listings carry no content type, so each object is looked up with a
//! metadata-only request.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::{Attribute, GetOptions, ObjectMeta, ObjectStore, RetryConfig};
use tracing::debug;

use crate::core::decoding::ContentKind;
use crate::core::{Bucket, BucketError, ListPage, ObjectAttrs, ObjectReader};

/// Content type reported when neither metadata nor extension gives one.
pub const UNKNOWN_CONTENT_TYPE: &str = "unknown";

/// Concurrent metadata lookups per listing page.
const HEAD_CONCURRENCY: usize = 8;

/// Bucket view over any `ObjectStore`.
pub struct ObjectStoreBucket {
    name: String,
    scheme: String,
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBucket {
    /// Wrap an existing store.
    pub fn new(
        name: impl Into<String>,
        scheme: impl Into<String>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            name: name.into(),
            scheme: scheme.into(),
            store,
        }
    }

    /// Build a GCS bucket from environment credentials.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::Read` if the client cannot be constructed.
    pub fn gcs(bucket: &str) -> Result<Self, BucketError> {
        let mut builder = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .with_retry(RetryConfig::default());

        if let Ok(service_account_key) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            debug!("Constructing GCS builder with service account key");
            builder = builder.with_service_account_key(&service_account_key);
        }

        let store = builder
            .build()
            .map_err(|e| BucketError::Read(e.to_string()))?;
        Ok(Self::new(bucket, "gs", Arc::new(store)))
    }

    /// Fetch metadata and stored attributes without the body.
    async fn head_attrs(&self, location: &Path) -> Result<ObjectAttrs, BucketError> {
        let options = GetOptions {
            head: true,
            ..GetOptions::default()
        };
        let result = self
            .store
            .get_opts(location, options)
            .await
            .map_err(map_store_error)?;
        let content_type: Option<&str> = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| value.as_ref());
        Ok(to_attrs(&result.meta, content_type))
    }
}

/// Stored content type, else a guess from the extension, else
/// [`UNKNOWN_CONTENT_TYPE`].
fn to_attrs(meta: &ObjectMeta, content_type: Option<&str>) -> ObjectAttrs {
    let name = meta.location.to_string();
    let content_type = content_type.map_or_else(
        || {
            ContentKind::from_extension(&name)
                .map_or(UNKNOWN_CONTENT_TYPE, ContentKind::mime)
                .to_string()
        },
        str::to_string,
    );
    ObjectAttrs::new(name, content_type, meta.last_modified, meta.size as u64)
}

fn map_store_error(err: object_store::Error) -> BucketError {
    match err {
        object_store::Error::NotFound { path, .. } => BucketError::NotFound(path),
        other => BucketError::Read(other.to_string()),
    }
}

#[async_trait]
impl Bucket for ObjectStoreBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    async fn list_page(
        &self,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, BucketError> {
        let stream = match page_token {
            Some(token) => self.store.list_with_offset(None, &Path::from(token)),
            None => self.store.list(None),
        };

        // One extra entry tells us whether another page exists.
        let mut metas: Vec<ObjectMeta> = stream
            .take(page_size + 1)
            .try_collect()
            .await
            .map_err(|e| BucketError::Listing(e.to_string()))?;

        let has_more = metas.len() > page_size;
        metas.truncate(page_size);
        let next_page_token = if has_more {
            metas.last().map(|meta| meta.location.to_string())
        } else {
            None
        };

        // Objects deleted since the listing are dropped from the page.
        let lookups: Vec<_> = metas
            .iter()
            .map(|meta| async move {
                match self.head_attrs(&meta.location).await {
                    Ok(attrs) => Ok(Some(attrs)),
                    Err(BucketError::NotFound(_)) => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .collect();
        let looked_up: Vec<Option<ObjectAttrs>> = futures::stream::iter(lookups)
            .buffered(HEAD_CONCURRENCY)
            .try_collect()
            .await?;
        let objects = looked_up.into_iter().flatten().collect();

        Ok(ListPage {
            objects,
            next_page_token,
        })
    }

    async fn attrs(&self, name: &str) -> Result<ObjectAttrs, BucketError> {
        self.head_attrs(&Path::from(name)).await
    }

    async fn open(&self, name: &str) -> Result<ObjectReader, BucketError> {
        let result = self
            .store
            .get(&Path::from(name))
            .await
            .map_err(map_store_error)?;
        let bytes = result.bytes().await.map_err(map_store_error)?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}
