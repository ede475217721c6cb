//! Bucket backends.

pub mod memory;
#[cfg(feature = "gcs")]
pub mod store;

pub use memory::InMemoryBucket;
#[cfg(feature = "gcs")]
pub use store::ObjectStoreBucket;
