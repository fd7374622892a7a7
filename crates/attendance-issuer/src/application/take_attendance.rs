//! AttendanceOrchestrator: the end-to-end "take attendance" flow.
//!
//! # Sequence
//!
//! ```text
//! probe ──► acquire(desired, max) ──► pick frequency ──► issue ──► emit
//!   │            │                                          │        │
//!   ▼            ▼                                          ▼        ▼
//! PermissionsMissing   Acquisition                      Issuance  Emission
//! ```
//!
//! Each step aborts the attempt on failure.  Components release their own
//! resources before returning an error, so the orchestrator only sequences.
//! The tone starts strictly after a successful issuance, at the frequency
//! that was sent to the backend.
//!
//! # Concurrency
//!
//! One attempt may be in flight per orchestrator.  A second concurrent
//! `take_attendance` call is rejected with
//! [`AttendanceError::AttemptInProgress`] without touching any hardware.
//!
//! `stop_attendance` during an attempt cancels the location search and marks
//! the attempt stopped.  The attempt then ends with
//! [`AttendanceError::Stopped`] at its next step, and the tone never starts.
//! The stop check and the tone start happen under the session lock, so a
//! stop can never miss a tone that is about to begin.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use attendance_core::{AttendanceSession, FrequencyHz, PermissionState};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use super::acquire_location::{AcquisitionError, AcquisitionSnapshot, LocationAcquirer};
use super::emit_frequency::{AudioError, EmitterHandle, FrequencyEmitter};
use super::issue_session::{IssuanceError, SessionIssuer};
use super::probe_permissions::PermissionProbe;

/// Coarse phase of the current attempt, published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttemptPhase {
    #[default]
    Idle,
    CheckingPermissions,
    AcquiringLocation,
    Issuing,
    Emitting { link_id: String },
    Failed { reason: String },
    Stopped,
}

/// Error type for the take-attendance use case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttendanceError {
    #[error("an attendance attempt is already in progress")]
    AttemptInProgress,
    #[error("{}", .0.missing_description().unwrap_or("required permissions are missing"))]
    PermissionsMissing(PermissionState),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
    #[error("could not start frequency emission: {0}")]
    Emission(#[from] AudioError),
    #[error("attendance attempt was stopped")]
    Stopped,
}

/// Per-attempt parameters that come from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSettings {
    pub issuer_id: String,
    pub desired_accuracy_m: f64,
    pub max_duration: Duration,
}

impl AttemptSettings {
    pub fn new(issuer_id: impl Into<String>) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            desired_accuracy_m: 20.0,
            max_duration: Duration::from_millis(5_000),
        }
    }
}

/// The issued session together with the tone that advertises it.
struct ActiveSession {
    session: AttendanceSession,
    emitter: EmitterHandle,
}

/// The Attendance Orchestrator.
pub struct AttendanceOrchestrator {
    probe: PermissionProbe,
    acquirer: LocationAcquirer,
    issuer: SessionIssuer,
    emitter: FrequencyEmitter,
    settings: AttemptSettings,
    in_flight: AtomicBool,
    stop_requested: AtomicBool,
    session: Mutex<Option<ActiveSession>>,
    phase: watch::Sender<AttemptPhase>,
}

impl AttendanceOrchestrator {
    pub fn new(
        probe: PermissionProbe,
        acquirer: LocationAcquirer,
        issuer: SessionIssuer,
        emitter: FrequencyEmitter,
        settings: AttemptSettings,
    ) -> Self {
        let (phase, _) = watch::channel(AttemptPhase::Idle);
        Self {
            probe,
            acquirer,
            issuer,
            emitter,
            settings,
            in_flight: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            session: Mutex::new(None),
            phase,
        }
    }

    /// Runs one attendance attempt for `course_id`.
    ///
    /// Any session and tone from a previous attempt are stopped first.  On
    /// success the returned session's frequency is the one being emitted.
    ///
    /// # Errors
    ///
    /// See [`AttendanceError`].  On error no tone is playing and no session
    /// is held.
    pub async fn take_attendance(&self, course_id: &str) -> Result<AttendanceSession, AttendanceError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or_else(|| {
            warn!(course_id, "rejecting concurrent attendance attempt");
            AttendanceError::AttemptInProgress
        })?;
        info!(course_id, "attendance attempt started");
        self.stop_requested.store(false, Ordering::Release);
        self.discard_session();

        match self.run(course_id).await {
            Ok(session) => Ok(session),
            Err(AttendanceError::Stopped) => {
                info!(course_id, "attendance attempt stopped before emission");
                self.phase.send_replace(AttemptPhase::Stopped);
                Err(AttendanceError::Stopped)
            }
            Err(e) => {
                warn!(course_id, "attendance attempt aborted: {e}");
                self.phase.send_replace(AttemptPhase::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, course_id: &str) -> Result<AttendanceSession, AttendanceError> {
        self.phase.send_replace(AttemptPhase::CheckingPermissions);
        let permissions = self.probe.probe().await;
        self.ensure_not_stopped()?;
        if !permissions.all_granted() {
            return Err(AttendanceError::PermissionsMissing(permissions));
        }

        self.phase.send_replace(AttemptPhase::AcquiringLocation);
        let acquired = self
            .acquirer
            .acquire(self.settings.desired_accuracy_m, self.settings.max_duration)
            .await;
        self.ensure_not_stopped()?;
        let location = acquired?;

        let frequency = FrequencyHz::random(&mut rand::thread_rng());
        info!(%frequency, accuracy = location.accuracy_meters, "frequency chosen");

        self.ensure_not_stopped()?;
        self.phase.send_replace(AttemptPhase::Issuing);
        let session = self
            .issuer
            .issue(
                &self.settings.issuer_id,
                course_id,
                location.latitude,
                location.longitude,
                frequency,
            )
            .await?;

        let mut slot = self.lock_session();
        if self.stop_requested.load(Ordering::Acquire) {
            warn!(course_id, link_id = %session.link_id, "session issued after stop; not emitting");
            return Err(AttendanceError::Stopped);
        }
        let emitter = self.emitter.start(session.frequency_hz)?;
        *slot = Some(ActiveSession {
            session: session.clone(),
            emitter,
        });
        drop(slot);
        self.phase.send_replace(AttemptPhase::Emitting {
            link_id: session.link_id.clone(),
        });
        info!(course_id, link_id = %session.link_id, "attendance attempt succeeded");
        Ok(session)
    }

    /// Stops the tone and forgets the active session.
    ///
    /// When an attempt is in flight it is stopped too: its location search is
    /// cancelled and it will not start a tone.  Idempotent; returns `true`
    /// only when something was actually stopped.
    pub fn stop_attendance(&self) -> bool {
        let mut stopped = false;
        if self.is_attempt_in_flight() && !self.stop_requested.swap(true, Ordering::AcqRel) {
            info!("stopping in-flight attendance attempt");
            self.acquirer.cancel();
            stopped = true;
        }
        stopped |= self.discard_session();
        if stopped {
            self.phase.send_replace(AttemptPhase::Stopped);
            info!("attendance stopped");
        }
        stopped
    }

    /// The session currently being advertised, if any.
    pub fn active_session(&self) -> Option<AttendanceSession> {
        self.lock_session().as_ref().map(|a| a.session.clone())
    }

    /// Current attempt phase.
    pub fn phase(&self) -> AttemptPhase {
        self.phase.borrow().clone()
    }

    /// Receiver for attempt phase changes.
    pub fn subscribe_phase(&self) -> watch::Receiver<AttemptPhase> {
        self.phase.subscribe()
    }

    /// Receiver for location acquisition progress.
    pub fn acquisition_progress(&self) -> watch::Receiver<AcquisitionSnapshot> {
        self.acquirer.subscribe()
    }

    /// Returns `true` while a `take_attendance` call is running.
    pub fn is_attempt_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn ensure_not_stopped(&self) -> Result<(), AttendanceError> {
        if self.stop_requested.load(Ordering::Acquire) {
            Err(AttendanceError::Stopped)
        } else {
            Ok(())
        }
    }

    fn discard_session(&self) -> bool {
        let previous = self.lock_session().take();
        let had_session = match previous {
            Some(active) => {
                self.emitter.stop(&active.emitter);
                true
            }
            None => false,
        };
        // A tone without a session must never outlive this call.
        self.emitter.stop_active() || had_session
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag when the attempt ends or its future is dropped.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
