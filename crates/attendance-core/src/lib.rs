//! # attendance-core
//!
//! Shared library for the proximity-verified attendance issuer.  It contains
//! the domain entities and the JSON wire protocol of the backend issuance
//! call.
//!
//! It has zero dependencies on positioning hardware, audio devices, or
//! network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! An instructor's device proves that students are physically present by doing
//! three things together:
//!
//! 1. Finding out where it is (a GPS-style position fix with an accuracy
//!    radius in metres).
//! 2. Playing a near-ultrasonic tone at a random frequency that nearby
//!    student phones can hear but people mostly cannot.
//! 3. Asking the backend for a short-lived attendance link bound to that
//!    location and frequency.
//!
//! This crate defines the vocabulary used by all three steps:
//!
//! - **`domain`** – Pure business rules.  The most important piece is
//!   [`AcquisitionState`], which keeps the best position sample seen so far
//!   using a strict "smaller accuracy radius wins" rule.
//!
//! - **`protocol`** – The request and response bodies exchanged with the
//!   backend, including lenient parsing of the expiry timestamp.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `attendance_core::LocationSample` instead of the full module path.
pub use domain::frequency::{FrequencyError, FrequencyHz, FREQUENCY_BAND_HIGH, FREQUENCY_BAND_LOW};
pub use domain::location::{
    AccuracyBand, AcquisitionState, AcquisitionStatus, LocationSample, PositionErrorKind,
    APPROXIMATE_ACCURACY_THRESHOLD_M,
};
pub use domain::permission::PermissionState;
pub use domain::session::{now_epoch_ms, AttendanceSession, RedemptionLink};
pub use protocol::messages::{IssueRequest, IssueResponse, IssuedLink, ResponseError, WireTimestamp};
