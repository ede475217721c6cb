//! A single pool worker: advertise readiness, run one job, repeat.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{PoolCounters, PoolError, WorkerTask};

/// Long-lived execution slot owned by the pool.
pub(super) struct Worker<T> {
    id: usize,
    job_tx: mpsc::Sender<T>,
    job_rx: mpsc::Receiver<T>,
    ready_tx: mpsc::Sender<mpsc::Sender<T>>,
    err_tx: mpsc::UnboundedSender<PoolError>,
    ctx: CancellationToken,
    quit: CancellationToken,
    counters: Arc<PoolCounters>,
}

impl<T: WorkerTask> Worker<T> {
    pub(super) fn new(
        id: usize,
        ready_tx: mpsc::Sender<mpsc::Sender<T>>,
        err_tx: mpsc::UnboundedSender<PoolError>,
        ctx: CancellationToken,
        quit: CancellationToken,
        counters: Arc<PoolCounters>,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel(1);
        Self {
            id,
            job_tx,
            job_rx,
            ready_tx,
            err_tx,
            ctx,
            quit,
            counters,
        }
    }

    /// Worker loop. Idle while advertised, busy while processing, stopped on quit.
    pub(super) async fn run(mut self) {
        debug!(worker_id = self.id, "worker started");

        loop {
            if self.quit.is_cancelled() {
                break;
            }
            if self.ready_tx.send(self.job_tx.clone()).await.is_err() {
                break;
            }

            let job = tokio::select! {
                biased;
                job = self.job_rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                () = self.quit.cancelled() => break,
            };

            self.process(job).await;
        }

        debug!(worker_id = self.id, "worker stopped");
    }

    /// Run one job, converting a panic into an error on the shared channel.
    async fn process(&self, job: T) {
        let active = self.counters.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .peak_active_jobs
            .fetch_max(active, Ordering::SeqCst);

        let outcome = AssertUnwindSafe(job.run(self.ctx.clone(), self.id))
            .catch_unwind()
            .await;

        self.counters.active_jobs.fetch_sub(1, Ordering::SeqCst);
        self.counters.completed_jobs.fetch_add(1, Ordering::Relaxed);

        if let Err(payload) = outcome {
            self.counters.panicked_jobs.fetch_add(1, Ordering::Relaxed);
            let message = panic_message(payload.as_ref());
            warn!(worker_id = self.id, panic = %message, "job panicked");
            let _ = self.err_tx.send(PoolError::WorkerPanic {
                worker_id: self.id,
                message,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
