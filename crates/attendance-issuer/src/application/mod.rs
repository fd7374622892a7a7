//! Application layer use cases for the attendance issuer.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules in `attendance-core`) and the infrastructure
//! (positioning hardware, audio devices, the HTTP backend).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal ("take attendance
//!   for course CS101").
//! - **Depend on abstractions** (`PositionSource`, `AudioOutput`,
//!   `SessionBackend`) rather than concrete implementations, so tests can
//!   drive them with scripted doubles.
//! - **Contain no OS calls, no sockets, no file system access**.
//!
//! # Sub-modules
//!
//! - **`acquire_location`** – Races a stream of position samples against a
//!   deadline and resolves exactly once with the best fix.  This is the most
//!   intricate use case; read its module docs first.
//!
//! - **`probe_permissions`** – Checks that positioning and audio output are
//!   usable before an attempt starts.
//!
//! - **`emit_frequency`** – Owns the single active near-ultrasonic tone.
//!
//! - **`issue_session`** – Validates and sends the issuance request, then
//!   turns the backend response into an [`attendance_core::AttendanceSession`].
//!
//! - **`take_attendance`** – The end-to-end flow: probe, acquire, issue,
//!   emit.
//!
//! - **`resolution`** – Small exactly-once result cell used by
//!   `acquire_location`.

pub mod acquire_location;
pub mod emit_frequency;
pub mod issue_session;
pub mod probe_permissions;
pub mod resolution;
pub mod take_attendance;
