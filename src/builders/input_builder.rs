//! Build bucket inputs from configuration.

use std::sync::Arc;

use anyhow::Context;

use crate::config::{InputConfig, Source};
use crate::core::{AppResult, Bucket, BucketError, Publisher};
use crate::runtime::BucketInput;

/// Build one `BucketInput` per configured bucket, sharing `publisher`.
///
/// `bucket_factory` creates the bucket client for each resolved source.
///
/// # Errors
///
/// Fails if the configuration is invalid or a bucket client cannot be created.
pub fn build_inputs<F>(
    cfg: &InputConfig,
    mut bucket_factory: F,
    publisher: Arc<dyn Publisher>,
) -> AppResult<Vec<BucketInput>>
where
    F: FnMut(&Source) -> Result<Arc<dyn Bucket>, BucketError>,
{
    let sources = cfg.sources().context("invalid input configuration")?;

    sources
        .into_iter()
        .map(|source| -> AppResult<BucketInput> {
            let bucket = bucket_factory(&source)
                .with_context(|| format!("creating client for bucket `{}`", source.bucket_name))?;
            Ok(BucketInput::new(source, bucket, Arc::clone(&publisher)))
        })
        .collect()
}
