//! LocationAcquirer: bounded-time, accuracy-improving position search.
//!
//! This use case is the heart of the issuer.  Positioning hardware pushes
//! samples at unpredictable intervals, each more or less accurate than the
//! last, and may end the stream with a terminal error.  The acquirer turns
//! that open-ended stream into exactly one result within a hard deadline.
//!
//! # Resolution paths
//!
//! ```text
//!                 ┌─ sample ≤ desired ──────────► Succeeded(sample)     early exit
//! InProgress ─────┼─ hardware error ────────────► Failed(kind)          or best so far
//!                 ├─ deadline, best exists ─────► Succeeded(best)       best effort
//!                 ├─ deadline, no sample ───────► TimedOut
//!                 └─ cancel() / superseded ─────► Failed(Cancelled)
//! ```
//!
//! The first path to fire settles a [`Resolution`]; later events are drained
//! and discarded.  Before the terminal state is published, the hardware
//! subscription is unsubscribed and the deadline timer and progress poll are
//! dropped, on every path.
//!
//! # Ownership of hardware handles
//!
//! One acquirer owns at most one subscription at a time (`active`).  A new
//! `acquire` call tears down any previous in-flight acquisition before it
//! subscribes, and dropping an `acquire` future releases its subscription
//! through [`ReleaseGuard`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use attendance_core::{
    AccuracyBand, AcquisitionState, AcquisitionStatus, LocationSample, PositionErrorKind,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::resolution::Resolution;

/// Identifies one hardware positioning subscription.
pub type WatchId = Uuid;

/// Message published before the first sample arrives.
const WAITING_MESSAGE: &str = "Getting your location...";

/// Options passed to the positioning hardware on subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Ask for the most accurate fix the device can produce.
    pub high_accuracy: bool,
    /// Hardware-side timeout for a fix.
    pub timeout: Duration,
    /// Maximum age of a cached fix the hardware may return.
    pub maximum_age: Duration,
}

/// One event delivered by a positioning subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionEvent {
    /// A new position fix.
    Sample(LocationSample),
    /// Terminal error; no further events follow.
    Error(PositionErrorKind),
}

/// A live positioning subscription.
///
/// Events arrive on an unbounded channel so the hardware callback never
/// blocks.  The subscription stays live until [`PositionSource::unsubscribe`]
/// is called with `id`.
#[derive(Debug)]
pub struct PositionWatch {
    pub id: WatchId,
    pub events: mpsc::UnboundedReceiver<PositionEvent>,
}

/// Trait abstracting the platform positioning subsystem.
///
/// Infrastructure implementations live in `infrastructure::positioning`.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Starts a subscription delivering zero or more samples and at most one
    /// terminal error.
    fn subscribe(&self, options: &WatchOptions) -> PositionWatch;

    /// Stops the subscription.  Unknown or already-stopped ids are ignored.
    fn unsubscribe(&self, id: WatchId);

    /// Performs a single position read.  May show the platform permission UI.
    async fn current_position(
        &self,
        options: &WatchOptions,
    ) -> Result<LocationSample, PositionErrorKind>;
}

/// Tuning for the acquirer that does not vary per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionConfig {
    /// Cadence at which progress is published, independent of samples.
    pub poll_interval: Duration,
    /// Request high-accuracy positioning from the hardware.
    pub high_accuracy: bool,
    /// Maximum age of a cached fix the hardware may return.
    pub maximum_age: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            high_accuracy: true,
            maximum_age: Duration::ZERO,
        }
    }
}

/// Error type for the acquire-location use case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    #[error("desired accuracy must be a positive number of metres, got {0}")]
    InvalidAccuracy(f64),
    #[error("maximum acquisition duration must be greater than zero")]
    ZeroDuration,
    #[error("no location sample acquired within the {}ms deadline", .waited.as_millis())]
    NoSampleWithinDeadline { waited: Duration },
    #[error("{}", .0.user_message())]
    Hardware(PositionErrorKind),
    #[error("location acquisition was cancelled")]
    Cancelled,
}

/// Progress of the current (or last) acquisition, as published to observers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AcquisitionSnapshot {
    pub state: AcquisitionState,
    /// `min(elapsed / max_duration, 1.0)`; never decreases within one acquisition.
    pub progress: f64,
    /// Human-readable progress message.
    pub message: String,
}

/// The in-flight acquisition's exclusively owned hardware handles.
struct ActiveAcquisition {
    attempt: Uuid,
    watch_id: WatchId,
    cancel: Arc<Notify>,
}

/// The Location Acquirer.
pub struct LocationAcquirer {
    source: Arc<dyn PositionSource>,
    config: AcquisitionConfig,
    active: Mutex<Option<ActiveAcquisition>>,
    snapshot: watch::Sender<AcquisitionSnapshot>,
}

impl LocationAcquirer {
    /// Creates an idle acquirer over `source`.
    pub fn new(source: Arc<dyn PositionSource>, config: AcquisitionConfig) -> Self {
        let (snapshot, _) = watch::channel(AcquisitionSnapshot::default());
        Self {
            source,
            config,
            active: Mutex::new(None),
            snapshot,
        }
    }

    /// Returns a receiver for progress snapshots.
    pub fn subscribe(&self) -> watch::Receiver<AcquisitionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> AcquisitionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns `true` while an acquisition holds a hardware subscription.
    pub fn is_acquiring(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Cancels the in-flight acquisition, if any.
    ///
    /// The hardware subscription is released before this returns; the
    /// pending `acquire` call resolves with [`AcquisitionError::Cancelled`]
    /// and drops its timers.  Returns `false` when nothing was in flight.
    pub fn cancel(&self) -> bool {
        let previous = self.lock_active().take();
        match previous {
            Some(active) => {
                info!(attempt = %active.attempt, "cancelling location acquisition");
                self.source.unsubscribe(active.watch_id);
                active.cancel.notify_one();
                true
            }
            None => false,
        }
    }

    /// Acquires a location within `max_duration`.
    ///
    /// Resolves early with the first sample whose accuracy is at or below
    /// `desired_accuracy_m`; otherwise resolves at the deadline with the most
    /// accurate sample seen.
    ///
    /// # Errors
    ///
    /// - [`AcquisitionError::InvalidAccuracy`] / [`AcquisitionError::ZeroDuration`]
    ///   for invalid arguments (no hardware is touched).
    /// - [`AcquisitionError::Hardware`] when the subscription reports a
    ///   terminal error before any sample arrived.
    /// - [`AcquisitionError::NoSampleWithinDeadline`] when the deadline fires
    ///   with no sample.
    /// - [`AcquisitionError::Cancelled`] after [`cancel`](Self::cancel) or
    ///   when a newer `acquire` call supersedes this one.
    pub async fn acquire(
        &self,
        desired_accuracy_m: f64,
        max_duration: Duration,
    ) -> Result<LocationSample, AcquisitionError> {
        if !(desired_accuracy_m.is_finite() && desired_accuracy_m > 0.0) {
            return Err(AcquisitionError::InvalidAccuracy(desired_accuracy_m));
        }
        if max_duration.is_zero() {
            return Err(AcquisitionError::ZeroDuration);
        }

        let attempt = Uuid::new_v4();
        let cancel = Arc::new(Notify::new());
        let mut subscription = self.begin(attempt, Arc::clone(&cancel), max_duration);
        let guard = ReleaseGuard {
            acquirer: self,
            attempt,
        };
        info!(
            %attempt,
            desired_accuracy_m,
            max_duration_ms = max_duration.as_millis() as u64,
            "location acquisition started"
        );

        let started = Instant::now();
        let deadline_at = started + max_duration;
        let mut deadline = Box::pin(time::sleep_until(deadline_at));
        let mut poll = time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancelled = Box::pin(cancel.notified());

        let mut state = AcquisitionState::in_progress();
        let mut progress = 0.0_f64;
        let mut message = WAITING_MESSAGE.to_string();
        self.publish(&state, progress, &message);

        let resolution = Resolution::new();
        let mut stream_open = true;

        while !resolution.is_settled() {
            tokio::select! {
                biased;

                () = &mut cancelled => {
                    settle(&resolution, attempt, "cancelled", Err(AcquisitionError::Cancelled));
                }

                event = subscription.events.recv(), if stream_open => match event {
                    Some(PositionEvent::Sample(_)) if Instant::now() >= deadline_at => {
                        // Events are polled before the deadline; a busy stream must not hold it off.
                        settle(&resolution, attempt, "deadline", deadline_outcome(&state, max_duration));
                    }
                    Some(PositionEvent::Sample(sample)) => {
                        state.set_elapsed_ms(elapsed_ms(started));
                        if !sample.has_usable_accuracy() {
                            warn!(%attempt, accuracy = sample.accuracy_meters, "discarding sample with unusable accuracy");
                            continue;
                        }
                        let improved = state.offer(sample);
                        debug!(%attempt, accuracy = sample.accuracy_meters, improved, "position sample delivered");
                        if let Some(best) = state.best_sample() {
                            message = AccuracyBand::classify(best.accuracy_meters, desired_accuracy_m)
                                .describe(best.accuracy_meters);
                        }
                        if sample.meets(desired_accuracy_m) {
                            settle(&resolution, attempt, "early-exit", Ok(sample));
                        } else {
                            self.publish(&state, progress, &message);
                        }
                    }
                    Some(PositionEvent::Error(kind)) => {
                        let outcome = match state.best_sample() {
                            Some(best) => {
                                warn!(%attempt, ?kind, "positioning error after samples; using best so far");
                                Ok(*best)
                            }
                            None => Err(AcquisitionError::Hardware(kind)),
                        };
                        settle(&resolution, attempt, "hardware-error", outcome);
                    }
                    None => {
                        debug!(%attempt, "position stream closed; waiting for deadline");
                        stream_open = false;
                    }
                },

                () = &mut deadline => {
                    settle(&resolution, attempt, "deadline", deadline_outcome(&state, max_duration));
                }

                _ = poll.tick() => {
                    state.set_elapsed_ms(elapsed_ms(started));
                    progress = progress.max(fraction(started.elapsed(), max_duration));
                    self.publish(&state, progress, &message);
                }
            }
        }

        // Release timers and the subscription before the terminal state is observable.
        drop(poll);
        drop(deadline);
        drop(cancelled);
        guard.release();
        while let Ok(late) = subscription.events.try_recv() {
            debug!(%attempt, ?late, "discarding event delivered after resolution");
        }
        drop(subscription);

        let outcome = resolution
            .into_inner()
            .unwrap_or(Err(AcquisitionError::Cancelled));

        let status = match &outcome {
            Ok(_) => AcquisitionStatus::Succeeded,
            Err(AcquisitionError::NoSampleWithinDeadline { .. }) => AcquisitionStatus::TimedOut,
            Err(_) => AcquisitionStatus::Failed,
        };
        state.set_elapsed_ms(elapsed_ms(started));
        state.finish(status);
        let final_message = match &outcome {
            Ok(sample) if sample.meets(desired_accuracy_m) => {
                AccuracyBand::HighAccuracy.describe(sample.accuracy_meters)
            }
            Ok(sample) => format!(
                "Using best available location (±{:.0}m)",
                sample.accuracy_meters
            ),
            Err(e) => e.to_string(),
        };
        let final_progress = match &outcome {
            Ok(_) => 1.0,
            Err(_) => progress.max(fraction(started.elapsed(), max_duration)),
        };
        self.publish(&state, final_progress, &final_message);

        match &outcome {
            Ok(sample) => info!(
                %attempt,
                accuracy = sample.accuracy_meters,
                elapsed_ms = state.elapsed_ms(),
                "location acquired"
            ),
            Err(e) => warn!(%attempt, elapsed_ms = state.elapsed_ms(), "location acquisition failed: {e}"),
        }
        outcome
    }

    /// Tears down any previous acquisition and opens a new subscription.
    fn begin(&self, attempt: Uuid, cancel: Arc<Notify>, max_duration: Duration) -> PositionWatch {
        let options = WatchOptions {
            high_accuracy: self.config.high_accuracy,
            timeout: max_duration,
            maximum_age: self.config.maximum_age,
        };
        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            warn!(previous = %previous.attempt, "superseding in-flight location acquisition");
            self.source.unsubscribe(previous.watch_id);
            previous.cancel.notify_one();
        }
        let subscription = self.source.subscribe(&options);
        debug!(%attempt, watch_id = %subscription.id, "position subscription opened");
        *active = Some(ActiveAcquisition {
            attempt,
            watch_id: subscription.id,
            cancel,
        });
        subscription
    }

    /// Releases `attempt`'s subscription if it still owns the slot.  Idempotent.
    fn release(&self, attempt: Uuid) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|a| a.attempt == attempt) {
            if let Some(owned) = active.take() {
                self.source.unsubscribe(owned.watch_id);
                debug!(%attempt, watch_id = %owned.watch_id, "position subscription released");
            }
        }
    }

    fn publish(&self, state: &AcquisitionState, progress: f64, message: &str) {
        self.snapshot.send_replace(AcquisitionSnapshot {
            state: state.clone(),
            progress,
            message: message.to_string(),
        });
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveAcquisition>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the acquisition's subscription when the `acquire` future ends or
/// is dropped mid-flight.
struct ReleaseGuard<'a> {
    acquirer: &'a LocationAcquirer,
    attempt: Uuid,
}

impl ReleaseGuard<'_> {
    fn release(&self) {
        self.acquirer.release(self.attempt);
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

fn settle(
    resolution: &Resolution<Result<LocationSample, AcquisitionError>>,
    attempt: Uuid,
    path: &'static str,
    outcome: Result<LocationSample, AcquisitionError>,
) {
    match resolution.settle(outcome) {
        Ok(()) => debug!(%attempt, path, "acquisition resolved"),
        Err(_) => debug!(%attempt, path, "acquisition already resolved; discarding"),
    }
}

fn deadline_outcome(
    state: &AcquisitionState,
    max_duration: Duration,
) -> Result<LocationSample, AcquisitionError> {
    match state.best_sample() {
        Some(best) => Ok(*best),
        None => Err(AcquisitionError::NoSampleWithinDeadline { waited: max_duration }),
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}

fn fraction(elapsed: Duration, max_duration: Duration) -> f64 {
    (elapsed.as_secs_f64() / max_duration.as_secs_f64()).min(1.0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
