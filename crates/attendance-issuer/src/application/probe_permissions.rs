//! PermissionProbe: checks positioning and audio capabilities.
//!
//! The probe never fails.  Every error, denial, or timeout is folded into a
//! `false` in the returned [`PermissionState`] and logged, so the caller only
//! has one thing to decide: proceed or tell the user what is missing.

use std::sync::Arc;
use std::time::Duration;

use attendance_core::PermissionState;
use tracing::{debug, warn};

use super::acquire_location::{PositionSource, WatchOptions};
use super::emit_frequency::AudioOutput;

/// The Permission Probe.
pub struct PermissionProbe {
    positioning: Arc<dyn PositionSource>,
    audio: Arc<dyn AudioOutput>,
    timeout: Duration,
}

impl PermissionProbe {
    /// Creates a probe that gives the positioning read at most `timeout`.
    pub fn new(
        positioning: Arc<dyn PositionSource>,
        audio: Arc<dyn AudioOutput>,
        timeout: Duration,
    ) -> Self {
        Self {
            positioning,
            audio,
            timeout,
        }
    }

    /// Checks both capabilities.
    ///
    /// Positioning counts as granted when a single read succeeds within the
    /// timeout.  Audio counts as granted when the output device probe
    /// succeeds.  No state is cached between calls.
    pub async fn probe(&self) -> PermissionState {
        let options = WatchOptions {
            high_accuracy: false,
            timeout: self.timeout,
            maximum_age: Duration::ZERO,
        };
        let positioning_granted = match tokio::time::timeout(
            self.timeout,
            self.positioning.current_position(&options),
        )
        .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(kind)) => {
                warn!(?kind, "positioning permission probe failed");
                false
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "positioning permission probe timed out");
                false
            }
        };

        let audio_granted = match self.audio.probe() {
            Ok(()) => true,
            Err(e) => {
                warn!("audio output probe failed: {e}");
                false
            }
        };

        let state = PermissionState {
            positioning_granted,
            audio_granted,
        };
        debug!(?state, "permission probe complete");
        state
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::acquire_location::{PositionWatch, WatchId};
    use crate::application::emit_frequency::{AudioError, ToneId};
    use async_trait::async_trait;
    use attendance_core::{FrequencyHz, LocationSample, PositionErrorKind};
    use tokio::sync::mpsc;

    /// Positioning double whose single read either succeeds, fails, or hangs.
    enum StubPositioning {
        Fix,
        Denied,
        Hang,
    }

    #[async_trait]
    impl PositionSource for StubPositioning {
        fn subscribe(&self, _options: &WatchOptions) -> PositionWatch {
            let (_tx, events) = mpsc::unbounded_channel();
            PositionWatch {
                id: WatchId::new_v4(),
                events,
            }
        }

        fn unsubscribe(&self, _id: WatchId) {}

        async fn current_position(
            &self,
            _options: &WatchOptions,
        ) -> Result<LocationSample, PositionErrorKind> {
            match self {
                StubPositioning::Fix => Ok(LocationSample {
                    latitude: 1.0,
                    longitude: 2.0,
                    accuracy_meters: 30.0,
                    captured_at_epoch_ms: 0,
                }),
                StubPositioning::Denied => Err(PositionErrorKind::PermissionDenied),
                StubPositioning::Hang => {
                    std::future::pending::<()>().await;
                    Err(PositionErrorKind::Unknown)
                }
            }
        }
    }

    struct StubAudio {
        should_fail: bool,
    }

    impl AudioOutput for StubAudio {
        fn probe(&self) -> Result<(), AudioError> {
            if self.should_fail {
                Err(AudioError::DeviceUnavailable("no device".to_string()))
            } else {
                Ok(())
            }
        }

        fn create_tone(&self, _f: FrequencyHz, _a: f32) -> Result<ToneId, AudioError> {
            Ok(ToneId::new())
        }

        fn stop(&self, _tone: ToneId) {}
    }

    fn probe_with(positioning: StubPositioning, audio_fails: bool) -> PermissionProbe {
        PermissionProbe::new(
            Arc::new(positioning),
            Arc::new(StubAudio {
                should_fail: audio_fails,
            }),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_both_granted() {
        let state = probe_with(StubPositioning::Fix, false).probe().await;
        assert!(state.all_granted());
    }

    #[tokio::test]
    async fn test_positioning_denied_is_reported_not_raised() {
        let state = probe_with(StubPositioning::Denied, false).probe().await;
        assert_eq!(
            state,
            PermissionState {
                positioning_granted: false,
                audio_granted: true
            }
        );
    }

    #[tokio::test]
    async fn test_audio_failure_is_reported() {
        let state = probe_with(StubPositioning::Fix, true).probe().await;
        assert!(state.positioning_granted);
        assert!(!state.audio_granted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_positioning_read_times_out_as_denied() {
        let started = tokio::time::Instant::now();
        let state = probe_with(StubPositioning::Hang, false).probe().await;
        assert!(!state.positioning_granted);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
