//! Bounded worker pool using the ready-pool dispatch pattern.
//!
//! Each idle worker advertises its private job channel on a shared "ready
//! pool". The dispatcher pairs one submitted job with one advertised channel
//! and hands the job over. `submit` does not return until that hand-off has
//! happened, which throttles producers to the rate the pool can drain.
//!
//! # Example
//!
//! ```rust,ignore
//! use bucket_shipper::core::WorkerPool;
//! use tokio_util::sync::CancellationToken;
//!
//! let ctx = CancellationToken::new();
//! let pool = WorkerPool::new(4, ctx.clone())?;
//! pool.start()?;
//! pool.submit(job).await?;   // blocks until a worker takes the job
//! pool.stop().await;          // waits for in-flight jobs
//! ```

mod worker;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use worker::Worker;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been stopped.
    PoolShutdown,

    /// The shared context was cancelled.
    Cancelled,

    /// `start` was called more than once.
    AlreadyStarted,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// A job panicked inside a worker.
    WorkerPanic {
        /// Worker that ran the job.
        worker_id: usize,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolShutdown => write!(f, "pool has been shut down"),
            Self::Cancelled => write!(f, "context cancelled"),
            Self::AlreadyStarted => write!(f, "pool already started"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::WorkerPanic { worker_id, message } => {
                write!(f, "worker {worker_id} recovered from panic: {message}")
            }
        }
    }
}

impl std::error::Error for PoolError {}

/// A unit of work executed by a pool worker.
#[async_trait]
pub trait WorkerTask: Send + 'static {
    /// Run the task on worker `worker_id`, observing `ctx` for cancellation.
    async fn run(self, ctx: CancellationToken, worker_id: usize);
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of workers.
    pub worker_count: usize,

    /// Workers currently advertising on the ready pool.
    pub idle_workers: usize,

    /// Jobs handed to a worker.
    pub submitted_jobs: u64,

    /// Jobs currently executing.
    pub active_jobs: u64,

    /// Highest number of jobs observed executing at once.
    pub peak_active_jobs: u64,

    /// Jobs that finished, including those that panicked.
    pub completed_jobs: u64,

    /// Jobs that panicked.
    pub panicked_jobs: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted_jobs: AtomicU64,
    pub active_jobs: AtomicU64,
    pub peak_active_jobs: AtomicU64,
    pub completed_jobs: AtomicU64,
    pub panicked_jobs: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize, idle_workers: usize) -> PoolStats {
        PoolStats {
            worker_count,
            idle_workers,
            submitted_jobs: self.submitted_jobs.load(Ordering::Relaxed),
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            peak_active_jobs: self.peak_active_jobs.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            panicked_jobs: self.panicked_jobs.load(Ordering::Relaxed),
        }
    }
}

/// A job in transit from `submit` to the dispatcher.
struct Dispatch<T> {
    job: T,
    /// Fired once a worker has taken the job.
    ack: oneshot::Sender<()>,
}

/// Receiving halves that move into the dispatcher on `start`.
struct Receivers<T> {
    submit_rx: mpsc::Receiver<Dispatch<T>>,
    ready_rx: mpsc::Receiver<mpsc::Sender<T>>,
}

/// Fixed-size pool of workers fed by a single dispatcher task.
pub struct WorkerPool<T: WorkerTask> {
    /// Number of workers.
    max_workers: usize,

    /// Shared cancellation context.
    ctx: CancellationToken,

    /// Quit signal for the dispatcher and workers (child of `ctx`).
    quit: CancellationToken,

    /// Submission queue sender.
    submit_tx: mpsc::Sender<Dispatch<T>>,

    /// Ready pool sender, cloned into every worker.
    ready_tx: mpsc::Sender<mpsc::Sender<T>>,

    /// Taken by `start`.
    receivers: Mutex<Option<Receivers<T>>>,

    /// Dispatcher task handle, taken by `stop`.
    dispatcher: Mutex<Option<JoinHandle<()>>>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    started: AtomicBool,
}

impl<T: WorkerTask> WorkerPool<T> {
    /// Create a pool of `max_workers` workers bound to `ctx`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if `max_workers` is zero.
    pub fn new(max_workers: usize, ctx: CancellationToken) -> Result<Self, PoolError> {
        if max_workers == 0 {
            return Err(PoolError::InvalidConfig(
                "max_workers must be greater than 0".into(),
            ));
        }

        let (submit_tx, submit_rx) = mpsc::channel(1);
        // Every worker holds at most one slot, so advertising never blocks.
        let (ready_tx, ready_rx) = mpsc::channel(max_workers);
        let quit = ctx.child_token();

        Ok(Self {
            max_workers,
            ctx,
            quit,
            submit_tx,
            ready_tx,
            receivers: Mutex::new(Some(Receivers {
                submit_rx,
                ready_rx,
            })),
            dispatcher: Mutex::new(None),
            counters: Arc::new(PoolCounters::default()),
            started: AtomicBool::new(false),
        })
    }

    /// Spawn every worker and then the dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::AlreadyStarted` on a second call.
    pub fn start(&self) -> Result<(), PoolError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(PoolError::AlreadyStarted);
        }
        let Some(receivers) = self.receivers.lock().take() else {
            return Err(PoolError::AlreadyStarted);
        };

        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for worker_id in 0..self.max_workers {
            let worker = Worker::new(
                worker_id,
                self.ready_tx.clone(),
                err_tx.clone(),
                self.ctx.clone(),
                self.quit.clone(),
                Arc::clone(&self.counters),
            );
            workers.spawn(worker.run());
        }
        drop(err_tx);

        let dispatcher = tokio::spawn(dispatch(
            receivers,
            err_rx,
            workers,
            self.ctx.clone(),
            self.quit.clone(),
            Arc::clone(&self.counters),
        ));
        *self.dispatcher.lock() = Some(dispatcher);

        info!(worker_count = self.max_workers, "worker pool started");
        Ok(())
    }

    /// Submit a job, waiting until a free worker has taken it.
    ///
    /// # Errors
    ///
    /// - `PoolError::Cancelled` if the shared context is cancelled first
    /// - `PoolError::PoolShutdown` if the pool is stopped first
    pub async fn submit(&self, job: T) -> Result<(), PoolError> {
        if self.quit.is_cancelled() {
            return Err(self.closed_error());
        }

        let (ack, acked) = oneshot::channel();
        tokio::select! {
            biased;
            () = self.quit.cancelled() => return Err(self.closed_error()),
            sent = self.submit_tx.send(Dispatch { job, ack }) => {
                if sent.is_err() {
                    return Err(self.closed_error());
                }
            }
        }

        tokio::select! {
            biased;
            () = self.quit.cancelled() => Err(self.closed_error()),
            acked = acked => acked.map_err(|_| self.closed_error()),
        }
    }

    /// Workers currently idle on the ready pool.
    ///
    /// Advisory only: the count can change as soon as it is read.
    pub fn available_workers(&self) -> usize {
        self.max_workers.saturating_sub(self.ready_tx.capacity())
    }

    /// Number of workers in the pool.
    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters
            .snapshot(self.max_workers, self.available_workers())
    }

    /// Stop the pool, waiting for in-flight jobs to finish.
    pub async fn stop(&self) {
        self.quit.cancel();
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "dispatcher task failed");
            }
        }
    }

    fn closed_error(&self) -> PoolError {
        if self.ctx.is_cancelled() {
            PoolError::Cancelled
        } else {
            PoolError::PoolShutdown
        }
    }
}

impl<T: WorkerTask> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Signal shutdown but don't wait; explicit stop() is required for a drain.
        if !self.quit.is_cancelled() {
            self.quit.cancel();
            debug!("WorkerPool dropped without explicit stop - workers will be detached");
        }
    }
}

/// Dispatcher loop: pairs submitted jobs with ready workers until quit.
async fn dispatch<T: WorkerTask>(
    receivers: Receivers<T>,
    mut err_rx: mpsc::UnboundedReceiver<PoolError>,
    mut workers: JoinSet<()>,
    ctx: CancellationToken,
    quit: CancellationToken,
    counters: Arc<PoolCounters>,
) {
    let Receivers {
        mut submit_rx,
        mut ready_rx,
    } = receivers;

    loop {
        tokio::select! {
            Some(err) = err_rx.recv() => {
                error!(error = %err, "worker reported an error");
            }
            () = ctx.cancelled() => {
                debug!("context cancelled, draining worker pool");
                break;
            }
            () = quit.cancelled() => {
                debug!("quit signalled, draining worker pool");
                break;
            }
            Some(dispatch) = submit_rx.recv() => {
                if !hand_off(dispatch, &mut ready_rx, &quit).await {
                    break;
                }
                counters.submitted_jobs.fetch_add(1, Ordering::Relaxed);
            }
            else => break,
        }
    }

    // Draining: stop every worker and wait for in-flight jobs.
    quit.cancel();
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "worker task ended abnormally");
        }
    }
    while let Ok(err) = err_rx.try_recv() {
        error!(error = %err, "worker reported an error");
    }

    info!("worker pool stopped");
}

/// Give one job to the next ready worker. Returns false once the pool quits.
async fn hand_off<T: WorkerTask>(
    dispatch: Dispatch<T>,
    ready_rx: &mut mpsc::Receiver<mpsc::Sender<T>>,
    quit: &CancellationToken,
) -> bool {
    let Dispatch { mut job, ack } = dispatch;
    loop {
        let worker_tx = tokio::select! {
            biased;
            () = quit.cancelled() => return false,
            ready = ready_rx.recv() => match ready {
                Some(worker_tx) => worker_tx,
                None => return false,
            },
        };

        match worker_tx.send(job).await {
            Ok(()) => {
                // The submitter may have given up; the job still runs.
                let _ = ack.send(());
                return true;
            }
            // Worker exited after advertising; try the next one.
            Err(mpsc::error::SendError(returned)) => job = returned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountJob {
        runs: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl WorkerTask for CountJob {
        async fn run(self, _ctx: CancellationToken, _worker_id: usize) {
            tokio::time::sleep(self.delay).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanicJob;

    #[async_trait]
    impl WorkerTask for PanicJob {
        async fn run(self, _ctx: CancellationToken, _worker_id: usize) {
            panic!("boom");
        }
    }

    #[test]
    fn test_pool_error_display() {
        assert_eq!(PoolError::PoolShutdown.to_string(), "pool has been shut down");
        assert_eq!(
            PoolError::WorkerPanic {
                worker_id: 3,
                message: "boom".into()
            }
            .to_string(),
            "worker 3 recovered from panic: boom"
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = WorkerPool::<PanicJob>::new(0, CancellationToken::new());
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_pool_runs_jobs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(2, CancellationToken::new()).unwrap();
        pool.start().unwrap();

        for _ in 0..5 {
            pool.submit(CountJob {
                runs: Arc::clone(&runs),
                delay: Duration::from_millis(5),
            })
            .await
            .unwrap();
        }
        pool.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 5);
        let stats = pool.stats();
        assert_eq!(stats.submitted_jobs, 5);
        assert_eq!(stats.completed_jobs, 5);
        assert!(stats.peak_active_jobs <= 2);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let pool = WorkerPool::<PanicJob>::new(1, CancellationToken::new()).unwrap();
        pool.start().unwrap();
        assert_eq!(pool.start(), Err(PoolError::AlreadyStarted));
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_panic_does_not_kill_worker() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(1, CancellationToken::new()).unwrap();
        pool.start().unwrap();

        pool.submit(Either::Panic(PanicJob)).await.unwrap();
        pool.submit(Either::Count(CountJob {
            runs: Arc::clone(&runs),
            delay: Duration::ZERO,
        }))
        .await
        .unwrap();
        pool.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().panicked_jobs, 1);
    }

    enum Either {
        Panic(PanicJob),
        Count(CountJob),
    }

    #[async_trait]
    impl WorkerTask for Either {
        async fn run(self, ctx: CancellationToken, worker_id: usize) {
            match self {
                Self::Panic(job) => job.run(ctx, worker_id).await,
                Self::Count(job) => job.run(ctx, worker_id).await,
            }
        }
    }

    #[tokio::test]
    async fn test_submit_after_stop_fails() {
        let pool = WorkerPool::<PanicJob>::new(1, CancellationToken::new()).unwrap();
        pool.start().unwrap();
        pool.stop().await;
        assert_eq!(pool.submit(PanicJob).await, Err(PoolError::PoolShutdown));
    }
}
