//! Timeline-driven position source.
//!
//! Each subscription replays the same script: a list of [`ScriptStep`]s,
//! each delivered at a fixed offset from the moment of subscription.  Steps
//! are scheduled with `tokio::time::sleep_until`, so under a paused test
//! clock a sample scripted at 200ms arrives at exactly 200ms of virtual time.
//!
//! The binary uses this source in place of a real positioning receiver; the
//! acquisition integration tests use it to reproduce receiver behaviour
//! deterministically.
//!
//! # Lifecycle
//!
//! `subscribe` spawns one replay task per watch.  `unsubscribe` aborts the
//! task, which drops the sending half and closes the stream.  A script that
//! ends without an error leaves the stream open until unsubscribed, like a
//! receiver that simply stops producing fixes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use attendance_core::{now_epoch_ms, LocationSample, PositionErrorKind};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::application::acquire_location::{
    PositionEvent, PositionSource, PositionWatch, WatchId, WatchOptions,
};

/// One scripted delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptStep {
    /// Offset from subscription at which the event is delivered.
    pub at: Duration,
    pub event: PositionEvent,
}

impl ScriptStep {
    /// A sample at `at_ms` with the given position and accuracy.
    pub fn sample(at_ms: u64, latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            at: Duration::from_millis(at_ms),
            event: PositionEvent::Sample(LocationSample {
                latitude,
                longitude,
                accuracy_meters,
                captured_at_epoch_ms: 0,
            }),
        }
    }

    /// A terminal error at `at_ms`.
    pub fn error(at_ms: u64, kind: PositionErrorKind) -> Self {
        Self {
            at: Duration::from_millis(at_ms),
            event: PositionEvent::Error(kind),
        }
    }
}

/// Replays a fixed script for every subscription.
pub struct ScriptedPositionSource {
    script: Arc<Vec<ScriptStep>>,
    denied: bool,
    tasks: Mutex<HashMap<WatchId, JoinHandle<()>>>,
    unsubscribes: Mutex<u32>,
}

impl ScriptedPositionSource {
    /// Creates a source from `steps`, ordered by offset.
    pub fn new(mut steps: Vec<ScriptStep>) -> Self {
        steps.sort_by_key(|s| s.at);
        Self {
            script: Arc::new(steps),
            denied: false,
            tasks: Mutex::new(HashMap::new()),
            unsubscribes: Mutex::new(0),
        }
    }

    /// A receiver converging on one position: one sample per `interval`,
    /// starting one interval after subscription, with the given accuracies.
    pub fn converging(latitude: f64, longitude: f64, accuracies: &[f64], interval: Duration) -> Self {
        let steps = accuracies
            .iter()
            .enumerate()
            .map(|(i, &acc)| {
                let at = interval.saturating_mul(i as u32 + 1);
                ScriptStep {
                    at,
                    ..ScriptStep::sample(0, latitude, longitude, acc)
                }
            })
            .collect();
        Self::new(steps)
    }

    /// A source whose permission is denied: single reads fail and every
    /// subscription immediately reports `PermissionDenied`.
    pub fn denied() -> Self {
        let mut source = Self::new(vec![ScriptStep::error(0, PositionErrorKind::PermissionDenied)]);
        source.denied = true;
        source
    }

    /// Number of replay tasks still attached to a live subscription.
    pub fn active_watches(&self) -> usize {
        self.lock_tasks().len()
    }

    pub fn unsubscribe_count(&self) -> u32 {
        *self.unsubscribes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<WatchId, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PositionSource for ScriptedPositionSource {
    fn subscribe(&self, options: &WatchOptions) -> PositionWatch {
        let (tx, events) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let Ok(runtime) = Handle::try_current() else {
            warn!(watch_id = %id, "no tokio runtime; scripted subscription will deliver nothing");
            return PositionWatch { id, events };
        };

        debug!(
            watch_id = %id,
            steps = self.script.len(),
            high_accuracy = options.high_accuracy,
            "scripted position subscription started"
        );
        let script = Arc::clone(&self.script);
        let started = Instant::now();
        let task = runtime.spawn(async move {
            for step in script.iter() {
                tokio::time::sleep_until(started + step.at).await;
                let event = match step.event {
                    PositionEvent::Sample(sample) => PositionEvent::Sample(LocationSample {
                        captured_at_epoch_ms: now_epoch_ms(),
                        ..sample
                    }),
                    other => other,
                };
                trace!(watch_id = %id, ?event, "delivering scripted position event");
                if tx.send(event).is_err() {
                    return;
                }
                if matches!(event, PositionEvent::Error(_)) {
                    return;
                }
            }
            // Hold the stream open until unsubscribed.
            std::future::pending::<()>().await;
        });
        self.lock_tasks().insert(id, task);
        PositionWatch { id, events }
    }

    fn unsubscribe(&self, id: WatchId) {
        if let Some(task) = self.lock_tasks().remove(&id) {
            task.abort();
            debug!(watch_id = %id, "scripted position subscription stopped");
        }
        *self.unsubscribes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    async fn current_position(
        &self,
        _options: &WatchOptions,
    ) -> Result<LocationSample, PositionErrorKind> {
        if self.denied {
            return Err(PositionErrorKind::PermissionDenied);
        }
        let first = self.script.iter().find_map(|step| match step.event {
            PositionEvent::Sample(sample) => Some(sample),
            PositionEvent::Error(_) => None,
        });
        first
            .map(|sample| LocationSample {
                captured_at_epoch_ms: now_epoch_ms(),
                ..sample
            })
            .ok_or(PositionErrorKind::PositionUnavailable)
    }
}

impl Drop for ScriptedPositionSource {
    fn drop(&mut self) {
        for (_, task) in self.lock_tasks().drain() {
            task.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
