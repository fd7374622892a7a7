//! Mock position source for testing.
//!
//! Allows tests to inject synthetic [`PositionEvent`]s into every live
//! subscription without a positioning receiver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use attendance_core::{LocationSample, PositionErrorKind};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::acquire_location::{
    PositionEvent, PositionSource, PositionWatch, WatchId, WatchOptions,
};

/// A mock implementation of [`PositionSource`] driven by the test body.
pub struct MockPositionSource {
    senders: Arc<Mutex<HashMap<WatchId, mpsc::UnboundedSender<PositionEvent>>>>,
    subscribe_count: Arc<Mutex<u32>>,
    unsubscribe_count: Arc<Mutex<u32>>,
    current: Arc<Mutex<Result<LocationSample, PositionErrorKind>>>,
}

impl MockPositionSource {
    /// Creates a source whose single reads succeed with a coarse fix.
    pub fn new() -> Self {
        Self {
            senders: Arc::new(Mutex::new(HashMap::new())),
            subscribe_count: Arc::new(Mutex::new(0)),
            unsubscribe_count: Arc::new(Mutex::new(0)),
            current: Arc::new(Mutex::new(Ok(LocationSample {
                latitude: 0.0,
                longitude: 0.0,
                accuracy_meters: 1_000.0,
                captured_at_epoch_ms: 0,
            }))),
        }
    }

    /// Makes single reads (the permission probe) fail with `kind`.
    pub fn deny_current_position(&self, kind: PositionErrorKind) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Err(kind);
    }

    /// Delivers a sample to every live subscription.
    pub fn inject_sample(&self, sample: LocationSample) {
        self.inject(PositionEvent::Sample(sample));
    }

    /// Delivers a terminal error to every live subscription.
    pub fn inject_error(&self, kind: PositionErrorKind) {
        self.inject(PositionEvent::Error(kind));
    }

    /// Number of subscriptions that have not been unsubscribed.
    pub fn live_subscriptions(&self) -> usize {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn subscribe_count(&self) -> u32 {
        *self.subscribe_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn unsubscribe_count(&self) -> u32 {
        *self.unsubscribe_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inject(&self, event: PositionEvent) {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        for sender in senders.values() {
            // A receiver dropped mid-resolution is not an error for the mock.
            let _ = sender.send(event);
        }
    }
}

impl Default for MockPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionSource for MockPositionSource {
    fn subscribe(&self, _options: &WatchOptions) -> PositionWatch {
        let (tx, events) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).insert(id, tx);
        *self.subscribe_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        PositionWatch { id, events }
    }

    fn unsubscribe(&self, id: WatchId) {
        // Drop the sender to close the channel
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
        *self.unsubscribe_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    async fn current_position(
        &self,
        _options: &WatchOptions,
    ) -> Result<LocationSample, PositionErrorKind> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options() -> WatchOptions {
        WatchOptions {
            high_accuracy: true,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::ZERO,
        }
    }

    fn sample(accuracy: f64) -> LocationSample {
        LocationSample {
            latitude: 1.0,
            longitude: 2.0,
            accuracy_meters: accuracy,
            captured_at_epoch_ms: 3,
        }
    }

    #[tokio::test]
    async fn test_mock_delivers_injected_events_in_order() {
        // Arrange
        let source = MockPositionSource::new();
        let mut watch = source.subscribe(&options());

        // Act
        source.inject_sample(sample(50.0));
        source.inject_error(PositionErrorKind::Timeout);

        // Assert
        assert_eq!(watch.events.recv().await, Some(PositionEvent::Sample(sample(50.0))));
        assert_eq!(
            watch.events.recv().await,
            Some(PositionEvent::Error(PositionErrorKind::Timeout))
        );
    }

    #[tokio::test]
    async fn test_mock_unsubscribe_closes_channel() {
        // Arrange
        let source = MockPositionSource::new();
        let mut watch = source.subscribe(&options());

        // Act
        source.unsubscribe(watch.id);

        // Assert – channel should be disconnected
        assert_eq!(watch.events.recv().await, None);
        assert_eq!(source.live_subscriptions(), 0);
        assert_eq!(source.subscribe_count(), 1);
        assert_eq!(source.unsubscribe_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_current_position_can_be_denied() {
        let source = MockPositionSource::new();
        assert!(source.current_position(&options()).await.is_ok());

        source.deny_current_position(PositionErrorKind::PermissionDenied);

        assert_eq!(
            source.current_position(&options()).await,
            Err(PositionErrorKind::PermissionDenied)
        );
    }
}
