//! Tests for checkpoint state

use std::sync::Arc;

use bucket_shipper::core::{Checkpoint, State, MAX_FAILED_JOB_RETRIES};
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

#[test]
fn test_save_is_monotonic() {
    let mut rng = StdRng::seed_from_u64(42);
    let state = State::new();
    let mut prev = state.checkpoint();

    for _ in 0..1_000 {
        let name = format!("Obj-{:04}", rng.random_range(0..5_000));
        let name = if rng.random_bool(0.5) { name.to_lowercase() } else { name };
        state.save(&name, at(rng.random_range(0..10_000)));

        let cp = state.checkpoint();
        assert!(cp.object_name.to_lowercase() >= prev.object_name.to_lowercase());
        assert!(cp.latest_entry_time >= prev.latest_entry_time);
        prev = cp;
    }
}

#[test]
fn test_bounded_retry() {
    let state = State::new();
    for _ in 0..MAX_FAILED_JOB_RETRIES {
        state.update_failed_jobs("x.json");
        assert!(state.is_failed("x.json"));
    }
    state.update_failed_jobs("x.json");
    assert!(!state.is_failed("x.json"));
}

#[test]
fn test_failed_job_success_does_not_advance() {
    let state = State::with_checkpoint(Checkpoint {
        object_name: "b.json".to_string(),
        latest_entry_time: Some(at(10)),
        failed_jobs: [("z.json".to_string(), 1)].into_iter().collect(),
    });

    state.save("z.json", at(99));

    let cp = state.checkpoint();
    assert_eq!(cp.object_name, "b.json");
    assert_eq!(cp.latest_entry_time, Some(at(10)));
    assert!(cp.failed_jobs.is_empty());
}

#[test]
fn test_checkpoint_serde() {
    let cp = Checkpoint {
        object_name: "a.json".to_string(),
        latest_entry_time: Some(at(5)),
        failed_jobs: [("x.json".to_string(), 2)].into_iter().collect(),
    };
    let json = serde_json::to_string(&cp).unwrap();
    let back: Checkpoint = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cp);

    let legacy: Checkpoint =
        serde_json::from_str(r#"{"object_name":"a","latest_entry_time":null}"#).unwrap();
    assert!(legacy.failed_jobs.is_empty());
    assert!(!legacy.has_progress());
}

#[test]
fn test_concurrent_saves_keep_maximum() {
    let state = Arc::new(State::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for i in 0..100 {
                    let n = t * 100 + i;
                    state.save(&format!("obj-{n:04}"), at(i64::from(n)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let cp = state.checkpoint();
    assert_eq!(cp.object_name, "obj-0799");
    assert_eq!(cp.latest_entry_time, Some(at(799)));
}
