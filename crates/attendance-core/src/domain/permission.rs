//! Hardware capability probe result.

use serde::{Deserialize, Serialize};

/// Whether positioning and audio output are currently usable.
///
/// Re-evaluated at the start of every attendance attempt; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionState {
    pub positioning_granted: bool,
    pub audio_granted: bool,
}

impl PermissionState {
    /// The conjunctive gate: both capabilities are available.
    pub fn all_granted(&self) -> bool {
        self.positioning_granted && self.audio_granted
    }

    /// User-actionable description of what is missing, or `None` when both
    /// capabilities are granted.
    pub fn missing_description(&self) -> Option<&'static str> {
        match (self.positioning_granted, self.audio_granted) {
            (true, true) => None,
            (false, true) => {
                Some("Location access is required. Enable location permission and try again.")
            }
            (true, false) => {
                Some("Audio output is required. Allow sound playback and try again.")
            }
            (false, false) => Some(
                "Location access and audio output are required. Enable both permissions and try again.",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_granted_requires_both_flags() {
        let both = PermissionState { positioning_granted: true, audio_granted: true };
        let no_audio = PermissionState { positioning_granted: true, audio_granted: false };
        let no_gps = PermissionState { positioning_granted: false, audio_granted: true };
        assert!(both.all_granted());
        assert!(!no_audio.all_granted());
        assert!(!no_gps.all_granted());
        assert!(!PermissionState::default().all_granted());
    }

    #[test]
    fn test_missing_description_is_none_only_when_granted() {
        let both = PermissionState { positioning_granted: true, audio_granted: true };
        assert!(both.missing_description().is_none());
        assert!(PermissionState::default().missing_description().is_some());
    }

    #[test]
    fn test_missing_description_names_the_missing_capability() {
        let no_gps = PermissionState { positioning_granted: false, audio_granted: true };
        let msg = no_gps.missing_description().unwrap();
        assert!(msg.contains("Location"));
        assert!(!msg.contains("Audio"));
    }
}
