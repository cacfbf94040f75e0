//! Progress telemetry observed through engine subscriptions

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{engine, engine_with, test_config, InstrumentedWriter};
use loadbench_core::{ProgressSnapshot, RunRequest, RunState, SnapshotKind};
use loadbench_storage::testing::TestDatabase;
use tokio_stream::StreamExt;

fn assert_well_ordered(events: &[ProgressSnapshot]) {
    assert!(!events.is_empty());
    for pair in events.windows(2) {
        assert!(
            pair[1].overall_progress + 1e-9 >= pair[0].overall_progress,
            "overall progress went backwards: {} -> {}",
            pair[0].overall_progress,
            pair[1].overall_progress
        );
        assert!(pair[1].phase >= pair[0].phase, "{} after {}", pair[1].phase, pair[0].phase);
    }
    for event in events {
        assert!((0.0..=100.0).contains(&event.overall_progress));
        assert!((0.0..=100.0).contains(&event.phase_progress));
    }
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "exactly one terminal snapshot");
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_completed_run_stream() {
    let db = TestDatabase::new().await.unwrap();
    let writer = Arc::new(InstrumentedWriter::new(&db).with_delay(Duration::from_millis(5)));
    let engine = engine_with(&db, test_config(), writer);

    let run = engine
        .start_run(RunRequest::new(500, 10, 2, "batched").with_batch_size(50))
        .await
        .unwrap();
    let events: Vec<_> = engine.subscribe(run.id).await.unwrap().collect().await;

    assert_well_ordered(&events);
    let last = events.last().unwrap();
    assert_eq!(last.kind, SnapshotKind::Complete);
    assert_eq!(last.phase, RunState::Completed);
    assert_eq!(last.overall_progress, 100.0);
    assert_eq!(last.rows_processed, 500);
    assert_eq!(last.test_id, run.id);

    // every phase boundary is reported
    for phase in [RunState::Generating, RunState::Validating, RunState::Inserting] {
        assert!(events.iter().any(|e| e.phase == phase), "missing {} snapshot", phase);
    }

    let wire: serde_json::Value = serde_json::from_str(&last.to_json()).unwrap();
    assert_eq!(wire["type"], "complete");
    assert_eq!(wire["testId"], run.id.to_string());
}

#[tokio::test]
async fn test_failed_run_stream_ends_with_error() {
    let db = TestDatabase::new().await.unwrap();
    let writer = Arc::new(
        InstrumentedWriter::new(&db)
            .with_delay(Duration::from_millis(5))
            .failing_on(2),
    );
    let engine = engine_with(&db, test_config(), writer);

    let run = engine
        .start_run(RunRequest::new(300, 10, 0, "batched").with_batch_size(100))
        .await
        .unwrap();
    let events: Vec<_> = engine.subscribe(run.id).await.unwrap().collect().await;

    assert_well_ordered(&events);
    let last = events.last().unwrap();
    assert_eq!(last.kind, SnapshotKind::Error);
    assert_eq!(last.phase, RunState::Failed);
    assert!(last.message.contains("injected failure"));
}

#[tokio::test]
async fn test_cancelled_run_stream() {
    let db = TestDatabase::new().await.unwrap();
    let writer = Arc::new(InstrumentedWriter::new(&db).with_delay(Duration::from_millis(20)));
    let engine = engine_with(&db, test_config(), writer.clone());

    let run = engine
        .start_run(RunRequest::new(5000, 10, 0, "batched").with_batch_size(100))
        .await
        .unwrap();
    let stream = engine.subscribe(run.id).await.unwrap();

    writer.first_unit.notified().await;
    engine.cancel_run(run.id).await.unwrap();
    let events: Vec<_> = stream.collect().await;

    assert_well_ordered(&events);
    let last = events.last().unwrap();
    assert_eq!(last.phase, RunState::Cancelled);
    assert!(last.overall_progress < 100.0);
}

#[tokio::test]
async fn test_subscribers_see_the_same_terminal_event() {
    let db = TestDatabase::new().await.unwrap();
    let writer = Arc::new(InstrumentedWriter::new(&db).with_delay(Duration::from_millis(5)));
    let engine = engine_with(&db, test_config(), writer);

    let run = engine
        .start_run(RunRequest::new(200, 10, 0, "single_row"))
        .await
        .unwrap();
    let first = engine.subscribe(run.id).await.unwrap();
    let second = engine.subscribe(run.id).await.unwrap();

    let (a, b) = tokio::join!(first.collect::<Vec<_>>(), second.collect::<Vec<_>>());
    assert_eq!(a.last().unwrap().kind, SnapshotKind::Complete);
    assert_eq!(b.last().unwrap().kind, SnapshotKind::Complete);
    assert_eq!(a.last().unwrap().rows_processed, b.last().unwrap().rows_processed);
}

#[tokio::test]
async fn test_late_subscriber_gets_final_state() {
    let db = TestDatabase::new().await.unwrap();
    let engine = engine(&db).await;

    let run = engine.start_run(RunRequest::new(30, 10, 0, "batched")).await.unwrap();
    engine.wait(run.id).await.unwrap();

    let events: Vec<_> = engine.subscribe(run.id).await.unwrap().collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SnapshotKind::Complete);
    assert_eq!(events[0].rows_processed, 30);
}
