//! In-memory publisher that records what it receives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{Checkpoint, Event, PublishError, Publisher};

/// Records every published event with the checkpoint handed alongside it.
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    published: Mutex<Vec<(Event, Checkpoint)>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl InMemoryPublisher {
    /// Create an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every publish, simulating a slow sink.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reject every publish while `failing` is set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events published so far, in arrival order.
    pub fn events(&self) -> Vec<Event> {
        self.published.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    /// Checkpoint snapshots published so far, in arrival order.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.published.lock().iter().map(|(_, cp)| cp.clone()).collect()
    }

    /// Number of accepted events.
    pub fn len(&self) -> usize {
        self.published.lock().len()
    }

    /// Whether no event has been accepted.
    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, event: Event, checkpoint: Checkpoint) -> Result<(), PublishError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Rejected(format!("event {} refused", event.id)));
        }
        self.published.lock().push((event, checkpoint));
        Ok(())
    }
}
