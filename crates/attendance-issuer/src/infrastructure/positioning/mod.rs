//! Positioning adapters implementing [`PositionSource`].
//!
//! - **`scripted`** – Replays a timeline of samples and errors on the tokio
//!   clock.  Used by the binary's simulated-hardware mode and by the
//!   clock-paused acquisition tests.
//! - **`mock`** – Lets a test push events into live subscriptions by hand
//!   and counts subscribe/unsubscribe calls.
//!
//! [`PositionSource`]: crate::application::acquire_location::PositionSource

pub mod mock;
pub mod scripted;

pub use mock::MockPositionSource;
pub use scripted::{ScriptStep, ScriptedPositionSource};
