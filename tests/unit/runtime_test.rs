//! Tests for running bucket inputs

use std::sync::Arc;

use bucket_shipper::config::Source;
use bucket_shipper::core::Checkpoint;
use bucket_shipper::infra::{InMemoryBucket, InMemoryPublisher};
use bucket_shipper::runtime::{run_inputs, BucketInput};
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn bucket(name: &str, objects: &[(&str, i64)]) -> Arc<InMemoryBucket> {
    let bucket = InMemoryBucket::new(name);
    for (object, secs) in objects {
        bucket.insert(*object, "text/plain", at(*secs), "line");
    }
    Arc::new(bucket)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_round_returns_final_checkpoint() {
    let publisher = Arc::new(InMemoryPublisher::new());
    let input = BucketInput::new(
        Source::new("logs").with_poll(false).with_max_workers(2),
        bucket("logs", &[("a.log", 1), ("b.log", 3), ("c.log", 2)]),
        publisher.clone(),
    );

    let cp = input.run(CancellationToken::new()).await.unwrap();
    assert_eq!(cp.object_name, "c.log");
    assert_eq!(cp.latest_entry_time, Some(at(3)));
    assert_eq!(publisher.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_skips_processed_objects() {
    let publisher = Arc::new(InMemoryPublisher::new());
    let input = BucketInput::new(
        Source::new("logs").with_poll(false),
        bucket("logs", &[("a.log", 1), ("b.log", 2), ("c.log", 3)]),
        publisher.clone(),
    )
    .with_cursor(Checkpoint {
        object_name: "b.log".to_string(),
        latest_entry_time: Some(at(2)),
        ..Checkpoint::default()
    });

    let cp = input.run(CancellationToken::new()).await.unwrap();
    assert_eq!(cp.object_name, "c.log");
    let events = publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fields["storage"]["object"]["name"], "c.log");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_inputs_collects_every_bucket() {
    let publisher = Arc::new(InMemoryPublisher::new());
    let inputs = vec![
        BucketInput::new(
            Source::new("one").with_poll(false),
            bucket("one", &[("a.log", 1)]),
            publisher.clone(),
        ),
        BucketInput::new(
            Source::new("two").with_poll(false),
            bucket("two", &[("a.log", 1), ("b.log", 2)]),
            publisher.clone(),
        )
        .with_cursor(Checkpoint {
            object_name: "a.log".to_string(),
            latest_entry_time: Some(at(1)),
            ..Checkpoint::default()
        }),
    ];

    let mut results = run_inputs(CancellationToken::new(), inputs).await;
    results.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].1.as_ref().unwrap().object_name, "a.log");
    assert_eq!(results[1].1.as_ref().unwrap().object_name, "b.log");
    assert_eq!(publisher.len(), 2);
}

#[tokio::test]
async fn test_cancelled_polling_input_stops() {
    let publisher = Arc::new(InMemoryPublisher::new());
    let input = BucketInput::new(
        Source::new("logs"),
        bucket("logs", &[("a.log", 1)]),
        publisher,
    );
    let ctx = CancellationToken::new();
    ctx.cancel();

    let cp = input.run(ctx).await.unwrap();
    assert!(!cp.has_progress());
}
