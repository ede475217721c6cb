//! # Bucket Shipper
//!
//! Polls cloud object-storage buckets and ships newly appeared objects as
//! structured events, with a resumable checkpoint.
//!
//! Object listings are ordered by name only, never by modification time. The
//! scheduler reconciles each listing page against a [`core::Checkpoint`]
//! holding the last processed name, the latest modification time and a map of
//! failed objects with their retry counts, so that no newer object is skipped
//! and failed objects are retried a bounded number of times.
//!
//! ## Pipeline
//!
//! - [`core::Scheduler`] lists a page sized to the number of idle workers,
//!   reconciles it and submits one [`core::Job`] per object.
//! - [`core::WorkerPool`] hands each job to an idle worker. `submit` waits for
//!   the hand-off, so listing never runs ahead of processing.
//! - A [`core::Job`] downloads and decodes its object, saves progress into the
//!   shared [`core::State`] and publishes an [`core::Event`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bucket_shipper::builders::build_inputs;
//! use bucket_shipper::config::InputConfig;
//! use bucket_shipper::infra::{InMemoryPublisher, ObjectStoreBucket};
//! use bucket_shipper::runtime::run_inputs;
//! use tokio_util::sync::CancellationToken;
//!
//! let cfg = InputConfig::from_json_str(r#"{"buckets":[{"name":"my-logs"}]}"#)?;
//! let publisher = Arc::new(InMemoryPublisher::new());
//! let inputs = build_inputs(
//!     &cfg,
//!     |source| Ok(Arc::new(ObjectStoreBucket::gcs(&source.bucket_name)?) as Arc<_>),
//!     publisher,
//! )?;
//! let results = run_inputs(CancellationToken::new(), inputs).await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling, checkpointing and job execution.
pub mod core;
/// Input configuration and per-bucket sources.
pub mod config;
/// Builders to construct bucket inputs from configuration.
pub mod builders;
/// Bucket and publisher adapters.
pub mod infra;
/// Runtime glue that runs inputs to completion.
pub mod runtime;
/// Shared utilities.
pub mod util;
