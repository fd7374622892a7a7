//! Position samples and the best-sample acquisition rule.
//!
//! The positioning hardware pushes samples at unpredictable intervals, and
//! each sample carries an *accuracy radius*: the radius in metres of the
//! 68%-confidence circle around the reported coordinates.  Smaller is better.
//!
//! [`AcquisitionState`] remembers the best sample seen during one
//! acquisition.  A new sample only replaces the current best when its radius
//! is *strictly* smaller; an equal radius never replaces it, so duplicate
//! events at identical accuracy do not churn the result.
//!
//! ```text
//! delivered:  150m ─► 80m ─► 80m ─► 120m ─► 45m
//! best:       150m    80m    80m    80m     45m
//!                           (tie)  (worse)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accuracy radius above which a fix is only "approximate".
pub const APPROXIMATE_ACCURACY_THRESHOLD_M: f64 = 100.0;

/// A single position fix produced by the positioning subsystem.
///
/// Immutable once captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Radius of the 68%-confidence circle, in metres.
    pub accuracy_meters: f64,
    /// Wall-clock capture time in milliseconds since the Unix epoch.
    pub captured_at_epoch_ms: i64,
}

impl LocationSample {
    /// Returns `true` when the accuracy radius can be compared at all.
    ///
    /// Hardware occasionally reports `NaN` or negative radii; such samples are
    /// discarded by the acquirer rather than poisoning the min-accuracy rule.
    pub fn has_usable_accuracy(&self) -> bool {
        self.accuracy_meters.is_finite() && self.accuracy_meters >= 0.0
    }

    /// Returns `true` when this sample satisfies `desired_accuracy_m`.
    ///
    /// Equality counts as satisfied.
    pub fn meets(&self, desired_accuracy_m: f64) -> bool {
        self.accuracy_meters <= desired_accuracy_m
    }
}

/// Terminal error reported by a positioning subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum PositionErrorKind {
    /// The user or platform denied location access (possibly mid-flight).
    #[error("location permission denied")]
    PermissionDenied,
    /// The hardware could not determine a position.
    #[error("position unavailable")]
    PositionUnavailable,
    /// The hardware gave up waiting for a fix.
    #[error("positioning hardware timed out")]
    Timeout,
    /// Any other failure.
    #[error("unknown positioning error")]
    Unknown,
}

impl PositionErrorKind {
    /// Human-readable, user-actionable message for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            PositionErrorKind::PermissionDenied => {
                "Location access was denied. Allow location access for this app and try again."
            }
            PositionErrorKind::PositionUnavailable => {
                "Your position could not be determined. Move closer to a window or enable location services."
            }
            PositionErrorKind::Timeout => {
                "The location request timed out. Please try again."
            }
            PositionErrorKind::Unknown => {
                "An unknown error occurred while getting your location."
            }
        }
    }
}

/// Lifecycle status of a location acquisition.
///
/// ```text
/// Idle ──► InProgress ──► Succeeded
///                    ├──► TimedOut
///                    └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcquisitionStatus {
    /// No acquisition has started yet.
    #[default]
    Idle,
    /// Subscription and deadline timer are live.
    InProgress,
    /// Resolved with a sample (early exit or best effort at the deadline).
    Succeeded,
    /// The deadline fired before any sample arrived.
    TimedOut,
    /// Resolved with a hardware error or was cancelled.
    Failed,
}

impl AcquisitionStatus {
    /// Returns `true` for `Succeeded`, `TimedOut` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AcquisitionStatus::Succeeded | AcquisitionStatus::TimedOut | AcquisitionStatus::Failed
        )
    }
}

/// Progress of one acquisition: best sample so far, elapsed time and status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AcquisitionState {
    best_sample: Option<LocationSample>,
    elapsed_ms: i64,
    status: AcquisitionStatus,
}

impl AcquisitionState {
    /// Creates an `Idle` state with no samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh `InProgress` state.
    pub fn in_progress() -> Self {
        Self {
            best_sample: None,
            elapsed_ms: 0,
            status: AcquisitionStatus::InProgress,
        }
    }

    /// The best (smallest accuracy radius) sample seen so far.
    pub fn best_sample(&self) -> Option<&LocationSample> {
        self.best_sample.as_ref()
    }

    /// Milliseconds since the acquisition started.
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed_ms
    }

    /// Current lifecycle status.
    pub fn status(&self) -> AcquisitionStatus {
        self.status
    }

    /// Offers a sample to the min-accuracy rule.
    ///
    /// Returns `true` if the sample became the new best.  Samples with an
    /// unusable accuracy radius and samples that are not strictly better are
    /// rejected.
    pub fn offer(&mut self, sample: LocationSample) -> bool {
        if !sample.has_usable_accuracy() {
            return false;
        }
        match self.best_sample {
            Some(best) if sample.accuracy_meters >= best.accuracy_meters => false,
            _ => {
                self.best_sample = Some(sample);
                true
            }
        }
    }

    /// Records elapsed time.  Elapsed time never moves backwards.
    pub fn set_elapsed_ms(&mut self, elapsed_ms: i64) {
        self.elapsed_ms = self.elapsed_ms.max(elapsed_ms);
    }

    /// Moves the state to a terminal status.
    ///
    /// A state that is already terminal keeps its first terminal status.
    pub fn finish(&mut self, status: AcquisitionStatus) {
        if !self.status.is_terminal() {
            self.status = status;
        }
    }
}

/// Coarse accuracy classification used for progress messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyBand {
    /// Radius above [`APPROXIMATE_ACCURACY_THRESHOLD_M`].
    Approximate,
    /// Radius in `(desired, 100m]`.
    Improving,
    /// Radius at or below the desired accuracy.
    HighAccuracy,
}

impl AccuracyBand {
    /// Classifies `accuracy_m` against `desired_accuracy_m`.
    ///
    /// The desired threshold is checked first, so a desired accuracy above
    /// 100m makes every sample at or below it `HighAccuracy`.
    pub fn classify(accuracy_m: f64, desired_accuracy_m: f64) -> Self {
        if accuracy_m <= desired_accuracy_m {
            AccuracyBand::HighAccuracy
        } else if accuracy_m <= APPROXIMATE_ACCURACY_THRESHOLD_M {
            AccuracyBand::Improving
        } else {
            AccuracyBand::Approximate
        }
    }

    /// Progress message for a sample of `accuracy_m` in this band.
    pub fn describe(self, accuracy_m: f64) -> String {
        match self {
            AccuracyBand::Approximate => {
                format!("Approximate location found (±{accuracy_m:.0}m), improving accuracy...")
            }
            AccuracyBand::Improving => {
                format!("Improving accuracy (±{accuracy_m:.0}m)...")
            }
            AccuracyBand::HighAccuracy => {
                format!("High accuracy achieved (±{accuracy_m:.0}m)")
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(accuracy: f64) -> LocationSample {
        LocationSample {
            latitude: 37.5665,
            longitude: 126.9780,
            accuracy_meters: accuracy,
            captured_at_epoch_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_new_state_is_idle_without_sample() {
        let state = AcquisitionState::new();
        assert_eq!(state.status(), AcquisitionStatus::Idle);
        assert!(state.best_sample().is_none());
    }

    #[test]
    fn test_offer_first_sample_becomes_best() {
        // Arrange
        let mut state = AcquisitionState::in_progress();

        // Act
        let accepted = state.offer(sample(150.0));

        // Assert
        assert!(accepted);
        assert_eq!(state.best_sample().map(|s| s.accuracy_meters), Some(150.0));
    }

    #[test]
    fn test_offer_strictly_better_sample_replaces_best() {
        let mut state = AcquisitionState::in_progress();
        state.offer(sample(150.0));
        assert!(state.offer(sample(80.0)));
        assert_eq!(state.best_sample().map(|s| s.accuracy_meters), Some(80.0));
    }

    #[test]
    fn test_offer_equal_accuracy_keeps_existing_best() {
        // Arrange: two samples with the same radius but different coordinates
        let mut state = AcquisitionState::in_progress();
        let first = sample(80.0);
        let mut second = sample(80.0);
        second.latitude = 0.0;
        state.offer(first);

        // Act
        let accepted = state.offer(second);

        // Assert – ties never replace the best
        assert!(!accepted);
        assert_eq!(state.best_sample(), Some(&first));
    }

    #[test]
    fn test_offer_worse_sample_is_rejected() {
        let mut state = AcquisitionState::in_progress();
        state.offer(sample(45.0));
        assert!(!state.offer(sample(120.0)));
        assert_eq!(state.best_sample().map(|s| s.accuracy_meters), Some(45.0));
    }

    #[test]
    fn test_offer_rejects_nan_and_negative_accuracy() {
        let mut state = AcquisitionState::in_progress();
        assert!(!state.offer(sample(f64::NAN)));
        assert!(!state.offer(sample(-1.0)));
        assert!(!state.offer(sample(f64::INFINITY)));
        assert!(state.best_sample().is_none());
    }

    #[test]
    fn test_best_accuracy_is_running_minimum() {
        // Arrange
        let deliveries = [150.0, 80.0, 80.0, 120.0, 45.0, 60.0, 12.0, 12.0];
        let mut state = AcquisitionState::in_progress();
        let mut running_min = f64::INFINITY;
        let mut previous_best = f64::INFINITY;

        for accuracy in deliveries {
            // Act
            state.offer(sample(accuracy));
            running_min = running_min.min(accuracy);

            // Assert – equals the minimum so far and never increases
            let best = state.best_sample().map(|s| s.accuracy_meters).unwrap();
            assert_eq!(best, running_min);
            assert!(best <= previous_best);
            previous_best = best;
        }
    }

    #[test]
    fn test_set_elapsed_never_moves_backwards() {
        let mut state = AcquisitionState::in_progress();
        state.set_elapsed_ms(1_000);
        state.set_elapsed_ms(500);
        assert_eq!(state.elapsed_ms(), 1_000);
    }

    #[test]
    fn test_finish_keeps_first_terminal_status() {
        let mut state = AcquisitionState::in_progress();
        state.finish(AcquisitionStatus::Succeeded);
        state.finish(AcquisitionStatus::Failed);
        assert_eq!(state.status(), AcquisitionStatus::Succeeded);
    }

    #[test]
    fn test_meets_includes_equality() {
        assert!(sample(20.0).meets(20.0));
        assert!(sample(19.9).meets(20.0));
        assert!(!sample(20.1).meets(20.0));
    }

    #[test]
    fn test_classify_bands() {
        assert_eq!(AccuracyBand::classify(150.0, 20.0), AccuracyBand::Approximate);
        assert_eq!(AccuracyBand::classify(100.0, 20.0), AccuracyBand::Improving);
        assert_eq!(AccuracyBand::classify(20.5, 20.0), AccuracyBand::Improving);
        assert_eq!(AccuracyBand::classify(20.0, 20.0), AccuracyBand::HighAccuracy);
        assert_eq!(AccuracyBand::classify(3.0, 20.0), AccuracyBand::HighAccuracy);
    }

    #[test]
    fn test_classify_with_desired_above_approximate_threshold() {
        assert_eq!(AccuracyBand::classify(140.0, 150.0), AccuracyBand::HighAccuracy);
        assert_eq!(AccuracyBand::classify(160.0, 150.0), AccuracyBand::Approximate);
    }

    #[test]
    fn test_describe_mentions_rounded_accuracy() {
        let msg = AccuracyBand::Improving.describe(45.4);
        assert!(msg.contains("±45m"), "unexpected message: {msg}");
    }

    #[test]
    fn test_position_error_messages_are_distinct() {
        let kinds = [
            PositionErrorKind::PermissionDenied,
            PositionErrorKind::PositionUnavailable,
            PositionErrorKind::Timeout,
            PositionErrorKind::Unknown,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
    }

    #[test]
    fn test_status_terminal_classification() {
        assert!(!AcquisitionStatus::Idle.is_terminal());
        assert!(!AcquisitionStatus::InProgress.is_terminal());
        assert!(AcquisitionStatus::Succeeded.is_terminal());
        assert!(AcquisitionStatus::TimedOut.is_terminal());
        assert!(AcquisitionStatus::Failed.is_terminal());
    }
}
