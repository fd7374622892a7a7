//! Mock audio output for testing.
//!
//! Records every `create_tone` and `stop` call so integration tests can
//! assert which frequency was emitted and how many times a tone was
//! released.

use std::sync::{Mutex, PoisonError};

use attendance_core::FrequencyHz;

use crate::application::emit_frequency::{AudioError, AudioOutput, ToneId};

/// A tone creation recorded by [`MockAudioOutput`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreatedTone {
    pub tone: ToneId,
    pub frequency: FrequencyHz,
    pub amplitude: f32,
}

/// A mock [`AudioOutput`] that records calls instead of producing sound.
#[derive(Default)]
pub struct MockAudioOutput {
    created: Mutex<Vec<CreatedTone>>,
    stopped: Mutex<Vec<ToneId>>,
    probe_count: Mutex<u32>,
    /// When `true`, `probe` and `create_tone` fail with `DeviceUnavailable`.
    pub should_fail: bool,
}

impl MockAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose device is unavailable.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<CreatedTone> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn stopped(&self) -> Vec<ToneId> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn probe_count(&self) -> u32 {
        *self.probe_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tones created and not yet stopped.
    pub fn playing(&self) -> Vec<CreatedTone> {
        let stopped = self.stopped();
        self.created()
            .into_iter()
            .filter(|t| !stopped.contains(&t.tone))
            .collect()
    }
}

impl AudioOutput for MockAudioOutput {
    fn probe(&self) -> Result<(), AudioError> {
        *self.probe_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if self.should_fail {
            return Err(AudioError::DeviceUnavailable("mock device disabled".to_string()));
        }
        Ok(())
    }

    fn create_tone(&self, frequency: FrequencyHz, amplitude: f32) -> Result<ToneId, AudioError> {
        if self.should_fail {
            return Err(AudioError::DeviceUnavailable("mock device disabled".to_string()));
        }
        let tone = ToneId::new();
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CreatedTone {
                tone,
                frequency,
                amplitude,
            });
        Ok(tone)
    }

    fn stop(&self, tone: ToneId) {
        self.stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tone);
    }
}
