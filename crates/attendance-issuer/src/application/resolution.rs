//! Exactly-once result cell.
//!
//! Location acquisition races three resolution paths (early exit, hardware
//! error, deadline) plus external cancellation.  Whichever path settles the
//! [`Resolution`] first wins; every later attempt gets its value handed back
//! and is discarded by the caller.

use std::sync::OnceLock;

/// A result slot that can be written exactly once.
#[derive(Debug)]
pub struct Resolution<T> {
    slot: OnceLock<T>,
}

impl<T> Resolution<T> {
    /// Creates an unsettled cell.
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Settles the cell with `value`.
    ///
    /// # Errors
    ///
    /// Returns `value` unchanged if the cell was already settled.
    pub fn settle(&self, value: T) -> Result<(), T> {
        self.slot.set(value)
    }

    /// Returns `true` once a value has been stored.
    pub fn is_settled(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Consumes the cell, returning the settled value, if any.
    pub fn into_inner(self) -> Option<T> {
        self.slot.into_inner()
    }
}

impl<T> Default for Resolution<T> {
    fn default() -> Self {
        Self::new()
    }
}
