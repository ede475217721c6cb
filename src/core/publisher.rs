//! Downstream publisher abstraction and the event shape it receives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::PublishError;
use crate::core::state::Checkpoint;

/// Event kind tag for events carrying object content.
pub const KIND_PUBLISH_DATA: &str = "publish_data";
/// Event kind tag for events carrying an error payload.
pub const KIND_PUBLISH_ERROR: &str = "publish_error";

/// Structured event produced from one bucket object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Deterministic identifier used for idempotent delivery.
    pub id: String,
    /// Creation time of the event.
    pub timestamp: DateTime<Utc>,
    /// Event fields.
    pub fields: Map<String, Value>,
}

impl Event {
    /// Value of `event.kind`, if present.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.fields.get("event")?.get("kind")?.as_str()
    }
}

/// Sink for events. The checkpoint snapshot is handed over for persistence.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Publish an event along with the checkpoint current at publish time.
    async fn publish(&self, event: Event, checkpoint: Checkpoint) -> Result<(), PublishError>;
}
