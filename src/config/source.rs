//! Input and per-bucket source configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on workers for a single bucket.
pub const MAX_WORKERS_LIMIT: usize = 5000;

const DEFAULT_MAX_WORKERS: usize = 1;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_BUCKET_TIMEOUT_SECS: u64 = 120;

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The input could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
    /// No buckets were configured.
    #[error("at least one bucket must be defined")]
    NoBuckets,
    /// A bucket entry has an empty name.
    #[error("bucket name must not be empty")]
    EmptyBucketName,
    /// The same bucket appears twice.
    #[error("bucket `{0}` is defined more than once")]
    DuplicateBucket(String),
    /// A field holds an out-of-range value.
    #[error("bucket `{bucket}`: {reason}")]
    Invalid {
        /// Bucket the value belongs to.
        bucket: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Per-bucket configuration; unset fields fall back to the input defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Bucket name.
    pub name: String,
    /// Maximum concurrent workers for this bucket.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Whether to keep polling after the first listing.
    #[serde(default)]
    pub poll: Option<bool>,
    /// Seconds between polls.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Seconds allowed for one page fetch or one object download.
    #[serde(default)]
    pub bucket_timeout_secs: Option<u64>,
    /// Whether JSON content is decoded into structured documents.
    #[serde(default)]
    pub parse_json: Option<bool>,
}

impl BucketConfig {
    /// Bucket entry with every field inherited from the input defaults.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Root configuration of the bucket input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Default maximum concurrent workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Default polling flag.
    #[serde(default = "default_poll")]
    pub poll: bool,
    /// Default seconds between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Default seconds allowed for one page fetch or one object download.
    #[serde(default = "default_bucket_timeout_secs")]
    pub bucket_timeout_secs: u64,
    /// Default JSON parsing flag.
    #[serde(default)]
    pub parse_json: bool,
    /// Buckets to poll.
    pub buckets: Vec<BucketConfig>,
}

const fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

const fn default_poll() -> bool {
    true
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_bucket_timeout_secs() -> u64 {
    DEFAULT_BUCKET_TIMEOUT_SECS
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            poll: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            bucket_timeout_secs: DEFAULT_BUCKET_TIMEOUT_SECS,
            parse_json: false,
            buckets: Vec::new(),
        }
    }
}

/// Resolved, immutable settings for polling one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Bucket name.
    pub bucket_name: String,
    /// Number of pool workers.
    pub max_workers: usize,
    /// Keep polling after the first listing.
    pub poll: bool,
    /// Pause between polls.
    pub poll_interval: Duration,
    /// Bound on a single page fetch or object download.
    pub bucket_timeout: Duration,
    /// Decode JSON content into structured documents.
    pub parse_json: bool,
}

impl Source {
    /// Source for `bucket_name` with input defaults.
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            max_workers: DEFAULT_MAX_WORKERS,
            poll: true,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            bucket_timeout: Duration::from_secs(DEFAULT_BUCKET_TIMEOUT_SECS),
            parse_json: false,
        }
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Enable or disable polling.
    #[must_use]
    pub const fn with_poll(mut self, poll: bool) -> Self {
        self.poll = poll;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the page/download timeout.
    #[must_use]
    pub const fn with_bucket_timeout(mut self, timeout: Duration) -> Self {
        self.bucket_timeout = timeout;
        self
    }

    /// Enable or disable JSON decoding.
    #[must_use]
    pub const fn with_parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = parse_json;
        self
    }
}

impl InputConfig {
    /// Validate defaults and every bucket after applying overrides.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buckets.is_empty() {
            return Err(ConfigError::NoBuckets);
        }

        let mut seen = HashSet::new();
        for bucket in &self.buckets {
            if bucket.name.trim().is_empty() {
                return Err(ConfigError::EmptyBucketName);
            }
            if !seen.insert(bucket.name.as_str()) {
                return Err(ConfigError::DuplicateBucket(bucket.name.clone()));
            }
            validate_source(&self.resolve(bucket))?;
        }
        Ok(())
    }

    /// Resolve every bucket into a `Source`, validating first.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if validation fails.
    pub fn sources(&self) -> Result<Vec<Source>, ConfigError> {
        self.validate()?;
        Ok(self.buckets.iter().map(|b| self.resolve(b)).collect())
    }

    /// Parse input configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON, or a validation error.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve(&self, bucket: &BucketConfig) -> Source {
        Source {
            bucket_name: bucket.name.clone(),
            max_workers: bucket.max_workers.unwrap_or(self.max_workers),
            poll: bucket.poll.unwrap_or(self.poll),
            poll_interval: Duration::from_secs(
                bucket.poll_interval_secs.unwrap_or(self.poll_interval_secs),
            ),
            bucket_timeout: Duration::from_secs(
                bucket.bucket_timeout_secs.unwrap_or(self.bucket_timeout_secs),
            ),
            parse_json: bucket.parse_json.unwrap_or(self.parse_json),
        }
    }
}

fn validate_source(source: &Source) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        bucket: source.bucket_name.clone(),
        reason: reason.to_string(),
    };
    if source.max_workers == 0 || source.max_workers > MAX_WORKERS_LIMIT {
        return Err(invalid("max_workers must be between 1 and 5000"));
    }
    if source.poll_interval.is_zero() {
        return Err(invalid("poll_interval_secs must be greater than 0"));
    }
    if source.bucket_timeout.is_zero() {
        return Err(invalid("bucket_timeout_secs must be greater than 0"));
    }
    Ok(())
}
