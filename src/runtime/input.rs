//! One bucket input: a worker pool and a scheduler over a shared state.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Source;
use crate::core::{Bucket, Checkpoint, Publisher, Scheduler, ShipperError, State, WorkerPool};

/// Polls a single bucket according to its `Source`.
pub struct BucketInput {
    source: Arc<Source>,
    bucket: Arc<dyn Bucket>,
    publisher: Arc<dyn Publisher>,
    cursor: Option<Checkpoint>,
}

impl BucketInput {
    /// Create an input starting from an empty checkpoint.
    pub fn new(source: Source, bucket: Arc<dyn Bucket>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            source: Arc::new(source),
            bucket,
            publisher,
            cursor: None,
        }
    }

    /// Resume from a persisted checkpoint instead of an empty one.
    #[must_use]
    pub fn with_cursor(mut self, cursor: Checkpoint) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Source this input polls.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Run one scheduling session from the stored cursor, if any.
    ///
    /// The pool is always stopped before returning, so every in-flight job
    /// has finished and the returned checkpoint reflects all of them.
    ///
    /// # Errors
    ///
    /// Returns pool setup errors and any error that ended scheduling.
    pub async fn run(&self, ctx: CancellationToken) -> Result<Checkpoint, ShipperError> {
        let bucket = self.source.bucket_name.as_str();
        let state = Arc::new(
            self.cursor
                .clone()
                .map_or_else(State::new, State::with_checkpoint),
        );

        let pool = Arc::new(WorkerPool::new(self.source.max_workers, ctx.clone())?);
        pool.start()?;
        info!(
            bucket,
            max_workers = self.source.max_workers,
            poll = self.source.poll,
            "bucket input started"
        );

        let scheduler = Scheduler::new(
            Arc::clone(&self.bucket),
            Arc::clone(&state),
            Arc::clone(&self.source),
            Arc::clone(&self.publisher),
            Arc::clone(&pool),
        );
        let result = scheduler.schedule(&ctx).await;

        pool.stop().await;
        let stats = pool.stats();
        info!(
            bucket,
            submitted = stats.submitted_jobs,
            completed = stats.completed_jobs,
            panicked = stats.panicked_jobs,
            "bucket input stopped"
        );

        result.map(|()| state.checkpoint())
    }
}

/// Run every input concurrently until each one finishes.
///
/// Results are returned per bucket name, in completion order.
pub async fn run_inputs(
    ctx: CancellationToken,
    inputs: Vec<BucketInput>,
) -> Vec<(String, Result<Checkpoint, ShipperError>)> {
    let mut set = JoinSet::new();
    for input in inputs {
        let ctx = ctx.clone();
        set.spawn(async move {
            let result = input.run(ctx).await;
            if let Err(err) = &result {
                error!(bucket = %input.source.bucket_name, error = %err, "bucket input failed");
            }
            (input.source.bucket_name.clone(), result)
        });
    }

    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => error!(error = %e, "bucket input task ended abnormally"),
        }
    }
    results
}
