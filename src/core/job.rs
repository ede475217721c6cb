//! A single bucket object to fetch, decode and publish.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Source;
use crate::core::bucket::{object_uri, Bucket, ObjectAttrs};
use crate::core::decoding::{ContentKind, Decoded};
use crate::core::error::ShipperError;
use crate::core::publisher::{Event, Publisher, KIND_PUBLISH_DATA, KIND_PUBLISH_ERROR};
use crate::core::state::State;
use crate::core::worker_pool::WorkerTask;

/// Identifier of one processing attempt of an object on a worker.
pub fn job_id(bucket: &str, object: &str, worker_id: usize) -> String {
    format!("{bucket}-{object}-worker-{worker_id}")
}

/// Deterministic event ID derived from a job ID.
pub fn event_id(job_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, job_id.as_bytes()).to_string()
}

/// Unit of work for one bucket object.
#[derive(Clone)]
pub struct Job {
    bucket: Arc<dyn Bucket>,
    object: ObjectAttrs,
    object_uri: String,
    state: Arc<State>,
    source: Arc<Source>,
    publisher: Arc<dyn Publisher>,
    is_failed: bool,
}

impl Job {
    /// Create a job for `object`. `is_failed` marks a retry of a failed object.
    pub fn new(
        bucket: Arc<dyn Bucket>,
        object: ObjectAttrs,
        state: Arc<State>,
        source: Arc<Source>,
        publisher: Arc<dyn Publisher>,
        is_failed: bool,
    ) -> Self {
        let object_uri = object_uri(bucket.as_ref(), &object.name);
        Self {
            bucket,
            object,
            object_uri,
            state,
            source,
            publisher,
            is_failed,
        }
    }

    /// Object name.
    pub fn name(&self) -> &str {
        &self.object.name
    }

    /// Object modification time.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.object.updated
    }

    /// Whether this job retries a previously failed object.
    pub const fn is_failed(&self) -> bool {
        self.is_failed
    }

    /// Object attributes.
    pub const fn object(&self) -> &ObjectAttrs {
        &self.object
    }

    /// Full object URI, e.g. `gs://bucket/name`.
    pub fn uri(&self) -> &str {
        &self.object_uri
    }

    /// Process the object on worker `worker_id`.
    ///
    /// The checkpoint is saved before the event is published. Any download,
    /// decode or publish failure is counted against the object's retry budget;
    /// cancellation is not.
    ///
    /// # Errors
    ///
    /// Returns the `ShipperError` that stopped processing.
    pub async fn execute(&self, ctx: &CancellationToken, worker_id: usize) -> Result<(), ShipperError> {
        let id = job_id(self.bucket.name(), &self.object.name, worker_id);

        let event = match ContentKind::from_content_type(&self.object.content_type) {
            Some(kind) => match self.extract(ctx, kind).await {
                Ok(decoded) => self.data_event(&id, decoded),
                Err(err) => {
                    if !err.is_cancelled() {
                        self.state.update_failed_jobs(&self.object.name);
                    }
                    return Err(err);
                }
            },
            None => {
                let err = ShipperError::UnsupportedContentType(self.object.content_type.clone());
                self.error_event(&id, &err)
            }
        };

        let cleared = self.state.save(&self.object.name, self.object.updated);

        if let Err(err) = self.publisher.publish(event, self.state.checkpoint()).await {
            if let Some(retries) = cleared {
                self.state.restore_failed_job(&self.object.name, retries);
            }
            self.state.update_failed_jobs(&self.object.name);
            return Err(err.into());
        }
        Ok(())
    }

    /// Download and decode the body, bounded by the bucket timeout.
    async fn extract(&self, ctx: &CancellationToken, kind: ContentKind) -> Result<Decoded, ShipperError> {
        let name = &self.object.name;
        let timeout = self.source.bucket_timeout;

        let download = async {
            let read_err = |reason: String| ShipperError::Read {
                object: name.clone(),
                reason,
            };
            let mut reader = self
                .bucket
                .open(name)
                .await
                .map_err(|e| read_err(e.to_string()))?;
            let mut raw = Vec::new();
            reader
                .read_to_end(&mut raw)
                .await
                .map_err(|e| read_err(e.to_string()))?;
            Ok::<_, ShipperError>(raw)
        };

        let raw = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(ShipperError::Cancelled),
            res = tokio::time::timeout(timeout, download) => {
                res.map_err(|_| ShipperError::Timeout {
                    operation: format!("download of `{name}`"),
                    timeout,
                })??
            }
        };

        kind.decode(name, &raw, self.source.parse_json)
            .map_err(|e| ShipperError::Decode {
                object: name.clone(),
                reason: e.to_string(),
            })
    }

    fn object_fields(&self, json_data: Option<Vec<Value>>) -> Value {
        let mut object = json!({
            "name": self.object.name,
            "content_type": self.object.content_type,
            "size": self.object.size,
            "updated": self.object.updated.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if let (Some(data), Some(map)) = (json_data, object.as_object_mut()) {
            map.insert("json_data".into(), Value::Array(data));
        }
        object
    }

    fn build_event(&self, id: &str, message: String, kind: &str, json_data: Option<Vec<Value>>) -> Event {
        let mut fields = Map::new();
        fields.insert("message".into(), Value::String(message));
        fields.insert("log".into(), json!({ "file": { "path": self.object_uri } }));
        fields.insert(
            "storage".into(),
            json!({
                "bucket": { "name": self.bucket.name() },
                "object": self.object_fields(json_data),
            }),
        );
        fields.insert("event".into(), json!({ "kind": kind }));

        Event {
            id: event_id(id),
            timestamp: Utc::now(),
            fields,
        }
    }

    fn data_event(&self, id: &str, decoded: Decoded) -> Event {
        self.build_event(id, decoded.message, KIND_PUBLISH_DATA, decoded.json_data)
    }

    fn error_event(&self, id: &str, err: &ShipperError) -> Event {
        let message = format!("job with id {id} encountered an error: {err}");
        let mut event = self.build_event(id, message.clone(), KIND_PUBLISH_ERROR, None);
        event
            .fields
            .insert("error".into(), json!({ "message": message }));
        event
    }
}

impl AsRef<ObjectAttrs> for Job {
    fn as_ref(&self) -> &ObjectAttrs {
        &self.object
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("uri", &self.object_uri)
            .field("updated", &self.object.updated)
            .field("is_failed", &self.is_failed)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WorkerTask for Job {
    async fn run(self, ctx: CancellationToken, worker_id: usize) {
        match self.execute(&ctx, worker_id).await {
            Ok(()) => debug!(worker_id, object = %self.object_uri, retry = self.is_failed, "job done"),
            Err(err) if err.is_cancelled() => {
                debug!(worker_id, object = %self.object_uri, "job cancelled");
            }
            Err(err) => warn!(worker_id, object = %self.object_uri, error = %err, "job failed"),
        }
    }
}
