//! Checkpoint state shared by every worker of a scheduling session.
//!
//! The checkpoint only ever moves forward: `save` takes the maximum over the
//! object name and the modification time, so completion order across workers
//! does not matter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Retries granted to a failed object before it is abandoned.
pub const MAX_FAILED_JOB_RETRIES: u32 = 3;

/// Resumable cursor over a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Lexicographically greatest successfully processed object name.
    pub object_name: String,
    /// Greatest modification time successfully processed.
    pub latest_entry_time: Option<DateTime<Utc>>,
    /// Failed object names mapped to their retry counts.
    #[serde(default)]
    pub failed_jobs: BTreeMap<String, u32>,
}

impl Checkpoint {
    /// True once at least one object has been saved.
    #[must_use]
    pub const fn has_progress(&self) -> bool {
        self.latest_entry_time.is_some()
    }
}

/// Mutex-guarded owner of the session checkpoint.
#[derive(Debug, Default)]
pub struct State {
    cp: Mutex<Checkpoint>,
}

impl State {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state resumed from a previously persisted checkpoint.
    #[must_use]
    pub fn with_checkpoint(cp: Checkpoint) -> Self {
        Self { cp: Mutex::new(cp) }
    }

    /// Record a successfully processed object.
    ///
    /// A pending failed job is cleared from the retry map instead of advancing
    /// the cursor; its retry count is returned so a later failure can restore it.
    pub fn save(&self, name: &str, modified: DateTime<Utc>) -> Option<u32> {
        let mut cp = self.cp.lock();
        if let Some(retries) = cp.failed_jobs.remove(name) {
            debug!(object = name, retries, "failed job recovered");
            return Some(retries);
        }

        if cp.object_name.is_empty() || name.to_lowercase() > cp.object_name.to_lowercase() {
            cp.object_name = name.to_string();
        }

        match cp.latest_entry_time {
            Some(latest) if modified <= latest => {}
            _ => cp.latest_entry_time = Some(modified),
        }
        None
    }

    /// Count a failure for `name`, dropping it once it exhausts its retries.
    pub fn update_failed_jobs(&self, name: &str) {
        let mut cp = self.cp.lock();
        let count = {
            let entry = cp.failed_jobs.entry(name.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if count > MAX_FAILED_JOB_RETRIES {
            cp.failed_jobs.remove(name);
            debug!(object = name, retries = count - 1, "failed job abandoned");
        }
    }

    /// Put back a retry count cleared by `save`, keeping any higher count
    /// recorded since.
    pub fn restore_failed_job(&self, name: &str, retries: u32) {
        let mut cp = self.cp.lock();
        let entry = cp.failed_jobs.entry(name.to_string()).or_insert(0);
        *entry = (*entry).max(retries);
    }

    /// Whether `name` is waiting for a retry.
    pub fn is_failed(&self, name: &str) -> bool {
        self.cp.lock().failed_jobs.contains_key(name)
    }

    /// Names of all objects waiting for a retry, in name order.
    pub fn failed_job_names(&self) -> Vec<String> {
        self.cp.lock().failed_jobs.keys().cloned().collect()
    }

    /// Replace the checkpoint, typically when resuming a session.
    pub fn set_checkpoint(&self, cp: Checkpoint) {
        *self.cp.lock() = cp;
    }

    /// Snapshot of the current checkpoint.
    pub fn checkpoint(&self) -> Checkpoint {
        self.cp.lock().clone()
    }
}
