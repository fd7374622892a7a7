//! Near-ultrasonic tone frequency.
//!
//! Student devices listen for a tone in the band `[19000, 19400)` Hz: high
//! enough that most adults cannot hear it, low enough that phone microphones
//! still pick it up.  One frequency is drawn uniformly at random per session.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest frequency of the band (inclusive).
pub const FREQUENCY_BAND_LOW: u32 = 19_000;
/// Upper bound of the band (exclusive).
pub const FREQUENCY_BAND_HIGH: u32 = 19_400;

/// Error returned when a value lies outside the emission band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("frequency {0} Hz is outside the emission band [{FREQUENCY_BAND_LOW}, {FREQUENCY_BAND_HIGH})")]
pub struct FrequencyError(pub u32);

/// An integer frequency in `[FREQUENCY_BAND_LOW, FREQUENCY_BAND_HIGH)`.
///
/// The only ways to build one are [`FrequencyHz::new`] (validated) and
/// [`FrequencyHz::random`], so an out-of-band value cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FrequencyHz(u32);

impl FrequencyHz {
    /// Validates `hz` against the emission band.
    ///
    /// # Errors
    ///
    /// Returns [`FrequencyError`] when `hz` is outside the band.
    pub fn new(hz: u32) -> Result<Self, FrequencyError> {
        if (FREQUENCY_BAND_LOW..FREQUENCY_BAND_HIGH).contains(&hz) {
            Ok(Self(hz))
        } else {
            Err(FrequencyError(hz))
        }
    }

    /// Draws a frequency uniformly from the band.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(FREQUENCY_BAND_LOW..FREQUENCY_BAND_HIGH))
    }

    /// The frequency in hertz.
    pub fn hz(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for FrequencyHz {
    type Error = FrequencyError;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        Self::new(hz)
    }
}

impl From<FrequencyHz> for u32 {
    fn from(f: FrequencyHz) -> Self {
        f.0
    }
}

impl fmt::Display for FrequencyHz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
