//! Tests for configuration validation

use std::time::Duration;

use bucket_shipper::config::{BucketConfig, ConfigError, InputConfig, MAX_WORKERS_LIMIT};

#[test]
fn test_defaults_from_json() {
    let cfg = InputConfig::from_json_str(r#"{"buckets":[{"name":"logs"}]}"#).unwrap();
    assert_eq!(cfg.max_workers, 1);
    assert!(cfg.poll);
    assert_eq!(cfg.poll_interval_secs, 300);
    assert_eq!(cfg.bucket_timeout_secs, 120);
    assert!(!cfg.parse_json);

    let sources = cfg.sources().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].bucket_name, "logs");
    assert_eq!(sources[0].bucket_timeout, Duration::from_secs(120));
}

#[test]
fn test_per_bucket_overrides_from_json() {
    let cfg = InputConfig::from_json_str(
        r#"{
            "max_workers": 4,
            "poll_interval_secs": 60,
            "parse_json": true,
            "buckets": [
                {"name": "a"},
                {"name": "b", "max_workers": 16, "poll": false, "bucket_timeout_secs": 5}
            ]
        }"#,
    )
    .unwrap();

    let sources = cfg.sources().unwrap();
    assert_eq!(sources[0].max_workers, 4);
    assert_eq!(sources[0].poll_interval, Duration::from_secs(60));
    assert!(sources[0].parse_json);

    assert_eq!(sources[1].max_workers, 16);
    assert!(!sources[1].poll);
    assert_eq!(sources[1].bucket_timeout, Duration::from_secs(5));
    assert!(sources[1].parse_json);
}

#[test]
fn test_empty_bucket_list_rejected() {
    let cfg = InputConfig::default();
    assert_eq!(cfg.validate(), Err(ConfigError::NoBuckets));
}

#[test]
fn test_empty_bucket_name_rejected() {
    let cfg = InputConfig {
        buckets: vec![BucketConfig::named("  ")],
        ..InputConfig::default()
    };
    assert_eq!(cfg.validate(), Err(ConfigError::EmptyBucketName));
}

#[test]
fn test_max_workers_bounds() {
    for workers in [0, MAX_WORKERS_LIMIT + 1] {
        let cfg = InputConfig {
            max_workers: workers,
            buckets: vec![BucketConfig::named("logs")],
            ..InputConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
    }

    let cfg = InputConfig {
        max_workers: MAX_WORKERS_LIMIT,
        buckets: vec![BucketConfig::named("logs")],
        ..InputConfig::default()
    };
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_zero_durations_rejected() {
    let cfg = InputConfig {
        buckets: vec![BucketConfig {
            poll_interval_secs: Some(0),
            ..BucketConfig::named("logs")
        }],
        ..InputConfig::default()
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));

    let cfg = InputConfig {
        bucket_timeout_secs: 0,
        buckets: vec![BucketConfig::named("logs")],
        ..InputConfig::default()
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_malformed_json() {
    let result = InputConfig::from_json_str("{ not json");
    assert!(matches!(result, Err(ConfigError::Parse(_))));

    let missing_buckets = InputConfig::from_json_str("{}");
    assert!(matches!(missing_buckets, Err(ConfigError::Parse(_))));
}
