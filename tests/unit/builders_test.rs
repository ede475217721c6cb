//! Tests for builder modules

use std::sync::Arc;

use bucket_shipper::builders::build_inputs;
use bucket_shipper::config::{BucketConfig, InputConfig};
use bucket_shipper::core::{Bucket, BucketError};
use bucket_shipper::infra::{InMemoryBucket, InMemoryPublisher};

fn config(names: &[&str]) -> InputConfig {
    InputConfig {
        max_workers: 3,
        buckets: names.iter().map(|n| BucketConfig::named(*n)).collect(),
        ..InputConfig::default()
    }
}

#[test]
fn test_build_one_input_per_bucket() {
    let publisher = Arc::new(InMemoryPublisher::new());
    let inputs = build_inputs(
        &config(&["a", "b"]),
        |source| Ok(Arc::new(InMemoryBucket::new(source.bucket_name.clone())) as Arc<dyn Bucket>),
        publisher,
    )
    .unwrap();

    let names: Vec<_> = inputs.iter().map(|i| i.source().bucket_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(inputs.iter().all(|i| i.source().max_workers == 3));
}

#[test]
fn test_invalid_config_rejected() {
    let publisher = Arc::new(InMemoryPublisher::new());
    let result = build_inputs(
        &config(&[]),
        |source| Ok(Arc::new(InMemoryBucket::new(source.bucket_name.clone())) as Arc<dyn Bucket>),
        publisher,
    );
    assert!(result.is_err());
}

#[test]
fn test_factory_error_names_bucket() {
    let publisher = Arc::new(InMemoryPublisher::new());
    let result = build_inputs(
        &config(&["broken"]),
        |_| Err(BucketError::Read("no credentials".to_string())),
        publisher,
    );
    let err = result.err().unwrap();
    assert!(format!("{err:#}").contains("broken"));
    assert!(format!("{err:#}").contains("no credentials"));
}
