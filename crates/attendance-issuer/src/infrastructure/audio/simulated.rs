//! Device-less audio output that renders real sine samples.
//!
//! Each tone runs a [`SineOscillator`] on its own tokio task, producing one
//! block of `BLOCK_FRAMES` mono samples per block period, the same cadence a
//! sound card callback would pull at.  The samples go nowhere; the task only
//! counts rendered frames and tracks the peak level so the binary can log
//! that a tone is live and tests can check its shape.
//!
//! # Phase accumulation
//!
//! ```text
//! phase_{n+1} = (phase_n + 2π·f / sample_rate) mod 2π
//! sample_n    = amplitude · sin(phase_n)
//! ```
//!
//! Keeping the phase across blocks avoids the click that restarting at zero
//! for every block would produce.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use attendance_core::FrequencyHz;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::application::emit_frequency::{AudioError, AudioOutput, ToneId};

/// Output sample rate.  Must exceed twice the highest emitted frequency.
pub const SAMPLE_RATE_HZ: u32 = 48_000;

/// Frames rendered per block.
const BLOCK_FRAMES: usize = 1_024;

/// Phase-accumulating sine generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SineOscillator {
    phase: f32,
    step: f32,
    amplitude: f32,
}

impl SineOscillator {
    pub fn new(frequency: FrequencyHz, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency.hz() as f32 / sample_rate as f32,
            amplitude,
        }
    }

    /// Fills `block` with the next samples and returns its peak magnitude.
    pub fn render(&mut self, block: &mut [f32]) -> f32 {
        let mut peak = 0.0_f32;
        for sample in block.iter_mut() {
            *sample = self.amplitude * self.phase.sin();
            peak = peak.max(sample.abs());
            self.phase = (self.phase + self.step) % TAU;
        }
        peak
    }
}

struct PlayingTone {
    frequency: FrequencyHz,
    frames: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

/// An [`AudioOutput`] that renders tones without a sound device.
pub struct SimulatedAudioOutput {
    sample_rate: u32,
    available: bool,
    tones: Mutex<HashMap<ToneId, PlayingTone>>,
}

impl SimulatedAudioOutput {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ,
            available: true,
            tones: Mutex::new(HashMap::new()),
        }
    }

    /// An output whose device reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ,
            available: false,
            tones: Mutex::new(HashMap::new()),
        }
    }

    /// Frequencies of the tones currently being rendered.
    pub fn active_tones(&self) -> Vec<FrequencyHz> {
        self.lock_tones().values().map(|t| t.frequency).collect()
    }

    /// Frames rendered so far for `tone`, or `None` if it is not playing.
    pub fn rendered_frames(&self, tone: ToneId) -> Option<u64> {
        self.lock_tones()
            .get(&tone)
            .map(|t| t.frames.load(Ordering::Relaxed))
    }

    fn block_period(&self) -> Duration {
        Duration::from_secs_f64(BLOCK_FRAMES as f64 / self.sample_rate as f64)
    }

    fn lock_tones(&self) -> MutexGuard<'_, HashMap<ToneId, PlayingTone>> {
        self.tones.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulatedAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for SimulatedAudioOutput {
    fn probe(&self) -> Result<(), AudioError> {
        if !self.available {
            return Err(AudioError::DeviceUnavailable(
                "simulated device disabled".to_string(),
            ));
        }
        Handle::try_current()
            .map(|_| ())
            .map_err(|e| AudioError::Platform(e.to_string()))
    }

    fn create_tone(&self, frequency: FrequencyHz, amplitude: f32) -> Result<ToneId, AudioError> {
        self.probe()?;
        if !(amplitude > 0.0 && amplitude <= 1.0) {
            return Err(AudioError::InvalidAmplitude(amplitude));
        }
        let runtime = Handle::try_current().map_err(|e| AudioError::Platform(e.to_string()))?;

        let tone = ToneId::new();
        let frames = Arc::new(AtomicU64::new(0));
        let mut oscillator = SineOscillator::new(frequency, amplitude, self.sample_rate);
        let period = self.block_period();
        let counter = Arc::clone(&frames);

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut block = vec![0.0_f32; BLOCK_FRAMES];
            loop {
                ticker.tick().await;
                let peak = oscillator.render(&mut block);
                let total = counter.fetch_add(BLOCK_FRAMES as u64, Ordering::Relaxed);
                trace!(%tone, peak, total, "rendered tone block");
            }
        });

        self.lock_tones().insert(
            tone,
            PlayingTone {
                frequency,
                frames,
                task,
            },
        );
        debug!(%tone, %frequency, amplitude, "simulated tone started");
        Ok(tone)
    }

    fn stop(&self, tone: ToneId) {
        if let Some(playing) = self.lock_tones().remove(&tone) {
            playing.task.abort();
            debug!(
                %tone,
                frames = playing.frames.load(Ordering::Relaxed),
                "simulated tone stopped"
            );
        }
    }
}

impl Drop for SimulatedAudioOutput {
    fn drop(&mut self) {
        for (_, playing) in self.lock_tones().drain() {
            playing.task.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
