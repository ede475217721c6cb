//! Bucket scheduler: lists pages, reconciles them against the checkpoint and
//! feeds the resulting jobs to the worker pool.
//!
//! Listings only come back in lexicographic name order, while progress is
//! tracked by both name and modification time. Each page is therefore cut down
//! with [`move_to_last_seen`] before submission, and objects waiting for a
//! retry are appended to it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Source;
use crate::core::bucket::{Bucket, ListPage, ObjectAttrs};
use crate::core::error::ShipperError;
use crate::core::job::Job;
use crate::core::publisher::Publisher;
use crate::core::state::{Checkpoint, State};
use crate::core::worker_pool::WorkerPool;

/// Pause between checks for a free worker when polling is disabled.
const IDLE_WORKER_WAIT: Duration = Duration::from_millis(10);

/// Drive one bucket through the worker pool.
pub struct Scheduler {
    bucket: Arc<dyn Bucket>,
    state: Arc<State>,
    source: Arc<Source>,
    publisher: Arc<dyn Publisher>,
    pool: Arc<WorkerPool<Job>>,
}

impl Scheduler {
    /// Create a scheduler. `pool` must already be started.
    pub fn new(
        bucket: Arc<dyn Bucket>,
        state: Arc<State>,
        source: Arc<Source>,
        publisher: Arc<dyn Publisher>,
        pool: Arc<WorkerPool<Job>>,
    ) -> Self {
        Self {
            bucket,
            state,
            source,
            publisher,
            pool,
        }
    }

    /// Run until done: one round when polling is off, otherwise a round every
    /// poll interval until `ctx` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the first non-cancellation error of a round, which ends polling.
    pub async fn schedule(&self, ctx: &CancellationToken) -> Result<(), ShipperError> {
        let bucket = self.bucket.name();

        if !self.source.poll {
            let free = loop {
                let free = self.pool.available_workers();
                if free > 0 {
                    break free;
                }
                tokio::select! {
                    () = ctx.cancelled() => return Ok(()),
                    () = tokio::time::sleep(IDLE_WORKER_WAIT) => {}
                }
            };
            return ignore_cancel(self.schedule_once(ctx, free).await);
        }

        loop {
            if ctx.is_cancelled() {
                return Ok(());
            }

            let page_size = self.pool.available_workers().max(1);
            ignore_cancel(self.schedule_once(ctx, page_size).await)?;

            debug!(bucket, interval = ?self.source.poll_interval, "waiting for next poll");
            tokio::select! {
                () = ctx.cancelled() => {
                    info!(bucket, "polling stopped");
                    return Ok(());
                }
                () = tokio::time::sleep(self.source.poll_interval) => {}
            }
        }
    }

    /// One pass over the whole bucket listing.
    ///
    /// # Errors
    ///
    /// - `ShipperError::Listing` or `ShipperError::Timeout` when a page fetch fails
    /// - `ShipperError::Cancelled` or `ShipperError::Pool` when submission stops
    pub async fn schedule_once(
        &self,
        ctx: &CancellationToken,
        page_size: usize,
    ) -> Result<(), ShipperError> {
        let page_size = page_size.max(1);
        let mut page_token: Option<String> = None;
        // Names submitted this round; none is submitted twice.
        let mut scheduled = HashSet::new();
        let mut submitted = 0_usize;

        loop {
            let page = self.fetch_page(ctx, page_token.as_deref(), page_size).await?;
            let mut jobs = self.create_jobs(page.objects);

            let cp = self.state.checkpoint();
            if cp.has_progress() {
                jobs = move_to_last_seen(jobs, &cp);
            }
            jobs.retain(|job| !scheduled.contains(job.name()));
            if !cp.failed_jobs.is_empty() {
                jobs = self.add_failed_jobs(ctx, jobs, &cp, &mut scheduled).await;
            }

            for job in jobs {
                scheduled.insert(job.name().to_string());
                self.pool.submit(job).await?;
                submitted += 1;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(bucket = self.bucket.name(), submitted, "scheduling round finished");
        Ok(())
    }

    /// Build jobs for a listing page, skipping directory markers.
    pub fn create_jobs(&self, objects: Vec<ObjectAttrs>) -> Vec<Job> {
        objects
            .into_iter()
            .filter(|attrs| !attrs.is_directory_marker())
            .map(|attrs| {
                let is_failed = self.state.is_failed(&attrs.name);
                self.job(attrs, is_failed)
            })
            .collect()
    }

    /// Append a retry job for every failed object that is neither in `jobs`
    /// nor already in `scheduled`. Added names are recorded in `scheduled`.
    ///
    /// Objects whose attributes cannot be fetched are skipped for this round.
    pub async fn add_failed_jobs(
        &self,
        ctx: &CancellationToken,
        mut jobs: Vec<Job>,
        cp: &Checkpoint,
        scheduled: &mut HashSet<String>,
    ) -> Vec<Job> {
        let in_batch: HashSet<String> = jobs.iter().map(|job| job.name().to_string()).collect();

        for name in cp.failed_jobs.keys() {
            if in_batch.contains(name) || scheduled.contains(name) {
                continue;
            }

            let attrs = tokio::select! {
                biased;
                () = ctx.cancelled() => break,
                res = tokio::time::timeout(self.source.bucket_timeout, self.bucket.attrs(name)) => res,
            };
            match attrs {
                Ok(Ok(attrs)) => {
                    scheduled.insert(name.clone());
                    jobs.push(self.job(attrs, true));
                }
                Ok(Err(err)) => {
                    warn!(bucket = self.bucket.name(), object = %name, error = %err, "failed to fetch attributes of failed job");
                }
                Err(_) => {
                    warn!(bucket = self.bucket.name(), object = %name, "timed out fetching attributes of failed job");
                }
            }
        }
        jobs
    }

    fn job(&self, attrs: ObjectAttrs, is_failed: bool) -> Job {
        Job::new(
            Arc::clone(&self.bucket),
            attrs,
            Arc::clone(&self.state),
            Arc::clone(&self.source),
            Arc::clone(&self.publisher),
            is_failed,
        )
    }

    async fn fetch_page(
        &self,
        ctx: &CancellationToken,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, ShipperError> {
        let timeout = self.source.bucket_timeout;
        let bucket = self.bucket.name();

        let res = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(ShipperError::Cancelled),
            res = tokio::time::timeout(timeout, self.bucket.list_page(page_token, page_size)) => res,
        };

        match res {
            Ok(Ok(page)) => {
                debug!(bucket, objects = page.objects.len(), "fetched listing page");
                Ok(page)
            }
            Ok(Err(source)) => Err(ShipperError::Listing {
                bucket: bucket.to_string(),
                source,
            }),
            Err(_) => Err(ShipperError::Timeout {
                operation: format!("listing bucket `{bucket}`"),
                timeout,
            }),
        }
    }
}

fn ignore_cancel(res: Result<(), ShipperError>) -> Result<(), ShipperError> {
    match res {
        Err(err) if err.is_cancelled() => Ok(()),
        other => other,
    }
}

/// Drop the jobs of a page that the checkpoint says are already processed.
///
/// Jobs modified after `latest_entry_time` are always kept and come first.
/// The remaining jobs are scanned in listing order for the checkpoint name
/// (case-insensitively): an exact match keeps what follows it, and the first
/// name sorting after it keeps from that job on. If neither is found the
/// checkpoint lies beyond this page and nothing of the remainder is kept.
pub fn move_to_last_seen<T: AsRef<ObjectAttrs>>(jobs: Vec<T>, cp: &Checkpoint) -> Vec<T> {
    let (mut latest, remainder): (Vec<T>, Vec<T>) = jobs.into_iter().partition(|job| {
        cp.latest_entry_time
            .map_or(true, |latest| job.as_ref().updated > latest)
    });

    let last_seen = cp.object_name.to_lowercase();
    let cut = remainder
        .iter()
        .position(|job| job.as_ref().name.to_lowercase() >= last_seen)
        .map_or(remainder.len(), |i| {
            if remainder[i].as_ref().name.to_lowercase() == last_seen {
                i + 1
            } else {
                i
            }
        });

    latest.extend(remainder.into_iter().skip(cut));
    latest
}
