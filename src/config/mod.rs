//! Configuration models for bucket inputs.

pub mod source;

pub use source::{BucketConfig, ConfigError, InputConfig, Source, MAX_WORKERS_LIMIT};
