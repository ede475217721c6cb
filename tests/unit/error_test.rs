//! Tests for error types

use std::time::Duration;

use bucket_shipper::config::ConfigError;
use bucket_shipper::core::{BucketError, PoolError, PublishError, ShipperError};

#[test]
fn test_listing_error() {
    let err = ShipperError::Listing {
        bucket: "logs".to_string(),
        source: BucketError::Listing("403 forbidden".to_string()),
    };
    assert_eq!(
        format!("{}", err),
        "listing bucket `logs` failed: listing failed: 403 forbidden"
    );
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_timeout_error() {
    let err = ShipperError::Timeout {
        operation: "download of `a.json`".to_string(),
        timeout: Duration::from_secs(2),
    };
    assert_eq!(format!("{}", err), "download of `a.json` timed out after 2s");
}

#[test]
fn test_unsupported_content_type_error() {
    let err = ShipperError::UnsupportedContentType("image/png".to_string());
    assert_eq!(format!("{}", err), "content-type image/png not supported");
}

#[test]
fn test_publish_error_conversion() {
    let err: ShipperError = PublishError::Closed.into();
    assert_eq!(format!("{}", err), "publish failed: publisher closed");
    assert!(!err.is_cancelled());
}

#[test]
fn test_config_error_conversion() {
    let err: ShipperError = ConfigError::NoBuckets.into();
    assert_eq!(
        format!("{}", err),
        "config error: at least one bucket must be defined"
    );
}

#[test]
fn test_cancellation_detection() {
    assert!(ShipperError::Cancelled.is_cancelled());
    assert!(ShipperError::Pool(PoolError::Cancelled).is_cancelled());
    assert!(!ShipperError::Pool(PoolError::PoolShutdown).is_cancelled());
}
