//! Core scheduling, checkpointing and job execution.

pub mod bucket;
pub mod decoding;
pub mod error;
pub mod job;
pub mod publisher;
pub mod scheduler;
pub mod state;
pub mod worker_pool;

pub use bucket::{object_uri, Bucket, ListPage, ObjectAttrs, ObjectReader};
pub use decoding::{ContentKind, DecodeError, Decoded};
pub use error::{AppResult, BucketError, PublishError, ShipperError};
pub use job::{event_id, job_id, Job};
pub use publisher::{Event, Publisher, KIND_PUBLISH_DATA, KIND_PUBLISH_ERROR};
pub use scheduler::{move_to_last_seen, Scheduler};
pub use state::{Checkpoint, State, MAX_FAILED_JOB_RETRIES};
pub use worker_pool::{PoolError, PoolStats, WorkerPool, WorkerTask};
