//! Infrastructure adapters for buckets and publishers.

pub mod bucket;
pub mod publisher;

pub use bucket::InMemoryBucket;
#[cfg(feature = "gcs")]
pub use bucket::ObjectStoreBucket;
pub use publisher::InMemoryPublisher;
