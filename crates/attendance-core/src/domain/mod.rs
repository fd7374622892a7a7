//! Domain entities for attendance issuance.
//!
//! Everything in this module is plain data plus the rules that govern it.
//! There is no async code and no I/O here, which keeps the rules easy to
//! unit test and cheap to benchmark.
//!
//! # Sub-modules
//!
//! - **`location`**   – Position samples, the best-sample tracking rule, and
//!   the accuracy bands used for progress messages.
//! - **`frequency`**  – The near-ultrasonic frequency band and uniform random
//!   selection within it.
//! - **`session`**    – The server-issued attendance session and the student
//!   redemption link built from it.
//! - **`permission`** – The result of probing positioning and audio access.

pub mod frequency;
pub mod location;
pub mod permission;
pub mod session;
