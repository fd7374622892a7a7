//! FrequencyEmitter: owns the single active near-ultrasonic tone.
//!
//! # Lifecycle
//!
//! ```text
//!        start(f)                 start(g)                   stop(handle)
//! Idle ──────────► Emitting(f) ──────────► Emitting(g) ───────────────► Idle
//!                      │        (f's tone stopped first)
//!                      └── stop_active() ─────────────────────────────► Idle
//! ```
//!
//! At most one tone plays at any time.  Stopping is idempotent: stopping a
//! handle that is no longer active, or stopping twice, never touches the
//! audio device again.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use attendance_core::FrequencyHz;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Identifies one tone created on an [`AudioOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToneId(pub Uuid);

impl ToneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ToneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ToneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error type for audio output operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    #[error("audio output device is unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("amplitude must be within (0, 1], got {0}")]
    InvalidAmplitude(f32),
    #[error("audio platform error: {0}")]
    Platform(String),
}

/// Trait abstracting the platform audio output.
///
/// Infrastructure implementations live in `infrastructure::audio`.
pub trait AudioOutput: Send + Sync {
    /// Checks that the output device can be used without starting a tone.
    fn probe(&self) -> Result<(), AudioError>;

    /// Starts a continuous sine tone at `frequency` and `amplitude`.
    fn create_tone(&self, frequency: FrequencyHz, amplitude: f32) -> Result<ToneId, AudioError>;

    /// Stops and releases a tone.  Unknown ids are ignored.
    fn stop(&self, tone: ToneId);
}

/// Handle to the tone started by [`FrequencyEmitter::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterHandle {
    tone: ToneId,
    frequency: FrequencyHz,
}

impl EmitterHandle {
    pub fn frequency(&self) -> FrequencyHz {
        self.frequency
    }

    pub fn tone(&self) -> ToneId {
        self.tone
    }
}

/// What the emitter is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterStatus {
    Idle,
    Emitting(FrequencyHz),
}

/// The Frequency Emitter.
pub struct FrequencyEmitter {
    output: Arc<dyn AudioOutput>,
    amplitude: f32,
    active: Mutex<Option<EmitterHandle>>,
}

impl FrequencyEmitter {
    /// Creates an idle emitter.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::InvalidAmplitude`] unless `0 < amplitude <= 1`.
    pub fn new(output: Arc<dyn AudioOutput>, amplitude: f32) -> Result<Self, AudioError> {
        if !(amplitude > 0.0 && amplitude <= 1.0) {
            return Err(AudioError::InvalidAmplitude(amplitude));
        }
        Ok(Self {
            output,
            amplitude,
            active: Mutex::new(None),
        })
    }

    /// Starts emitting `frequency`, stopping any previously active tone first.
    ///
    /// # Errors
    ///
    /// Propagates [`AudioError`] from the device.  The emitter is left idle in
    /// that case.
    pub fn start(&self, frequency: FrequencyHz) -> Result<EmitterHandle, AudioError> {
        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            debug!(tone = %previous.tone, "replacing active tone");
            self.output.stop(previous.tone);
        }
        let tone = self.output.create_tone(frequency, self.amplitude)?;
        let handle = EmitterHandle { tone, frequency };
        *active = Some(handle);
        info!(%frequency, %tone, "frequency emission started");
        Ok(handle)
    }

    /// Stops the tone behind `handle` if it is still the active one.
    ///
    /// Returns `true` when a tone was actually stopped.
    pub fn stop(&self, handle: &EmitterHandle) -> bool {
        let mut active = self.lock_active();
        if active.as_ref() != Some(handle) {
            return false;
        }
        *active = None;
        self.output.stop(handle.tone);
        info!(frequency = %handle.frequency, "frequency emission stopped");
        true
    }

    /// Stops whatever tone is active.  Returns `true` when one was stopped.
    pub fn stop_active(&self) -> bool {
        let previous = self.lock_active().take();
        match previous {
            Some(handle) => {
                self.output.stop(handle.tone);
                info!(frequency = %handle.frequency, "frequency emission stopped");
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> EmitterStatus {
        match *self.lock_active() {
            Some(handle) => EmitterStatus::Emitting(handle.frequency),
            None => EmitterStatus::Idle,
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<EmitterHandle>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
