//! Integration tests for location acquisition on a simulated clock.
//!
//! These tests drive `LocationAcquirer` with the timeline-driven
//! `ScriptedPositionSource` under `start_paused = true`, so every deadline
//! and sample offset is exact virtual time.

use std::sync::Arc;
use std::time::Duration;

use attendance_core::{AcquisitionStatus, PositionErrorKind};
use attendance_issuer::application::acquire_location::{
    AcquisitionConfig, AcquisitionError, LocationAcquirer, PositionSource,
};
use attendance_issuer::infrastructure::positioning::{
    MockPositionSource, ScriptStep, ScriptedPositionSource,
};
use tokio::time::Instant;

const DESIRED_M: f64 = 20.0;
const DEADLINE: Duration = Duration::from_millis(5_000);

fn acquirer_over(source: Arc<dyn PositionSource>) -> LocationAcquirer {
    LocationAcquirer::new(source, AcquisitionConfig::default())
}

// ── Resolution paths ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_qualifying_first_sample_resolves_at_its_arrival() {
    // Arrange: first sample 15m at 200ms, threshold 20m, deadline 5000ms
    let source = Arc::new(ScriptedPositionSource::new(vec![ScriptStep::sample(
        200, 37.55, 126.99, 15.0,
    )]));
    let acquirer = acquirer_over(Arc::clone(&source) as Arc<dyn PositionSource>);
    let started = Instant::now();

    // Act
    let sample = acquirer.acquire(DESIRED_M, DEADLINE).await.expect("must succeed");
    let elapsed = started.elapsed();

    // Assert
    assert_eq!(sample.accuracy_meters, 15.0);
    assert!(
        elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(250),
        "resolved at {elapsed:?}"
    );
    assert_eq!(acquirer.snapshot().state.status(), AcquisitionStatus::Succeeded);
    assert_eq!(source.active_watches(), 0, "subscription must be released");
}

#[tokio::test(start_paused = true)]
async fn test_non_qualifying_samples_resolve_best_effort_at_deadline() {
    // Arrange: [150m, 80m, 45m] at 1000ms intervals
    let source = Arc::new(ScriptedPositionSource::converging(
        37.55,
        126.99,
        &[150.0, 80.0, 45.0],
        Duration::from_millis(1_000),
    ));
    let acquirer = acquirer_over(Arc::clone(&source) as Arc<dyn PositionSource>);
    let started = Instant::now();

    // Act
    let sample = acquirer.acquire(DESIRED_M, DEADLINE).await.expect("best effort");
    let elapsed = started.elapsed();

    // Assert
    assert_eq!(sample.accuracy_meters, 45.0);
    assert!(
        elapsed >= DEADLINE && elapsed < DEADLINE + Duration::from_millis(50),
        "resolved at {elapsed:?}"
    );
    let snapshot = acquirer.snapshot();
    assert_eq!(snapshot.state.best_sample().map(|s| s.accuracy_meters), Some(45.0));
    assert_eq!(snapshot.progress, 1.0);
    assert_eq!(source.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_accuracy_equal_to_desired_exits_early() {
    let source = Arc::new(ScriptedPositionSource::converging(
        0.0,
        0.0,
        &[60.0, 20.0],
        Duration::from_millis(300),
    ));
    let acquirer = acquirer_over(source);
    let started = Instant::now();

    let sample = acquirer.acquire(DESIRED_M, DEADLINE).await.unwrap();

    assert_eq!(sample.accuracy_meters, 20.0);
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_no_samples_before_deadline_fails() {
    // Arrange: the only sample arrives after the deadline
    let source = Arc::new(ScriptedPositionSource::new(vec![ScriptStep::sample(
        6_000, 0.0, 0.0, 5.0,
    )]));
    let acquirer = acquirer_over(Arc::clone(&source) as Arc<dyn PositionSource>);

    // Act
    let result = acquirer.acquire(DESIRED_M, DEADLINE).await;

    // Assert
    assert_eq!(
        result,
        Err(AcquisitionError::NoSampleWithinDeadline { waited: DEADLINE })
    );
    assert_eq!(acquirer.snapshot().state.status(), AcquisitionStatus::TimedOut);
    assert!(acquirer.snapshot().state.best_sample().is_none());
    assert_eq!(source.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hardware_error_before_any_sample_aborts_immediately() {
    let source = Arc::new(ScriptedPositionSource::new(vec![
        ScriptStep::error(400, PositionErrorKind::PositionUnavailable),
        ScriptStep::sample(900, 0.0, 0.0, 5.0),
    ]));
    let acquirer = acquirer_over(Arc::clone(&source) as Arc<dyn PositionSource>);
    let started = Instant::now();

    let err = acquirer.acquire(DESIRED_M, DEADLINE).await.unwrap_err();

    assert_eq!(err, AcquisitionError::Hardware(PositionErrorKind::PositionUnavailable));
    assert_eq!(err.to_string(), PositionErrorKind::PositionUnavailable.user_message());
    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(source.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_each_hardware_error_kind_has_distinct_message() {
    let kinds = [
        PositionErrorKind::PermissionDenied,
        PositionErrorKind::PositionUnavailable,
        PositionErrorKind::Timeout,
        PositionErrorKind::Unknown,
    ];
    let mut messages = Vec::new();
    for kind in kinds {
        let source = Arc::new(ScriptedPositionSource::new(vec![ScriptStep::error(10, kind)]));
        let err = acquirer_over(source)
            .acquire(DESIRED_M, DEADLINE)
            .await
            .unwrap_err();
        messages.push(err.to_string());
    }
    messages.sort();
    messages.dedup();
    assert_eq!(messages.len(), 4);
}

// ── Best-sample invariant ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_best_sample_is_running_minimum_at_every_observation() {
    // Arrange
    let accuracies = [90.0, 120.0, 70.0, 70.0, 85.0, 40.0, 55.0];
    let source = Arc::new(ScriptedPositionSource::converging(
        1.0,
        2.0,
        &accuracies,
        Duration::from_millis(400),
    ));
    let acquirer = Arc::new(acquirer_over(source));
    let mut rx = acquirer.subscribe();
    let task = {
        let acquirer = Arc::clone(&acquirer);
        tokio::spawn(async move { acquirer.acquire(DESIRED_M, DEADLINE).await })
    };

    // Act – record the best accuracy at every published snapshot
    let mut observed = Vec::new();
    while rx.changed().await.is_ok() {
        let snap = rx.borrow_and_update().clone();
        if let Some(best) = snap.state.best_sample() {
            observed.push(best.accuracy_meters);
        }
        if snap.state.status().is_terminal() {
            break;
        }
    }
    let result = task.await.unwrap().unwrap();

    // Assert
    assert!(observed.windows(2).all(|w| w[1] <= w[0]), "best regressed: {observed:?}");
    assert_eq!(result.accuracy_meters, 40.0);
    assert_eq!(observed.last().copied(), Some(40.0));
}

// ── Cancellation & resource ownership ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_subscription_before_returning() {
    let source = Arc::new(MockPositionSource::new());
    let acquirer = Arc::new(acquirer_over(Arc::clone(&source) as Arc<dyn PositionSource>));
    let task = {
        let acquirer = Arc::clone(&acquirer);
        tokio::spawn(async move { acquirer.acquire(DESIRED_M, DEADLINE).await })
    };
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(source.live_subscriptions(), 1);

    assert!(acquirer.cancel());
    assert_eq!(source.live_subscriptions(), 0);

    assert_eq!(task.await.unwrap(), Err(AcquisitionError::Cancelled));
    assert_eq!(source.unsubscribe_count(), 1, "release must not unsubscribe twice");
}

#[tokio::test(start_paused = true)]
async fn test_second_acquire_tears_down_first() {
    // Arrange
    let source = Arc::new(MockPositionSource::new());
    let acquirer = Arc::new(acquirer_over(Arc::clone(&source) as Arc<dyn PositionSource>));
    let first = {
        let acquirer = Arc::clone(&acquirer);
        tokio::spawn(async move { acquirer.acquire(DESIRED_M, DEADLINE).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Act
    let second = {
        let acquirer = Arc::clone(&acquirer);
        tokio::spawn(async move { acquirer.acquire(DESIRED_M, DEADLINE).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Assert
    assert_eq!(first.await.unwrap(), Err(AcquisitionError::Cancelled));
    assert_eq!(source.subscribe_count(), 2);
    assert_eq!(source.live_subscriptions(), 1);

    source.inject_sample(attendance_core::LocationSample {
        latitude: 0.0,
        longitude: 0.0,
        accuracy_meters: 8.0,
        captured_at_epoch_ms: 0,
    });
    assert_eq!(second.await.unwrap().map(|s| s.accuracy_meters), Ok(8.0));
    assert_eq!(source.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_every_path_leaves_no_live_subscription() {
    let scripts: Vec<Vec<ScriptStep>> = vec![
        vec![ScriptStep::sample(50, 0.0, 0.0, 5.0)],
        vec![ScriptStep::sample(50, 0.0, 0.0, 500.0)],
        vec![ScriptStep::error(50, PositionErrorKind::Timeout)],
        vec![],
    ];
    for script in scripts {
        let source = Arc::new(ScriptedPositionSource::new(script));
        let acquirer = acquirer_over(Arc::clone(&source) as Arc<dyn PositionSource>);

        let _ = acquirer.acquire(DESIRED_M, Duration::from_millis(1_000)).await;

        assert_eq!(source.active_watches(), 0);
        assert_eq!(source.unsubscribe_count(), 1);
        assert!(!acquirer.is_acquiring());
    }
}
