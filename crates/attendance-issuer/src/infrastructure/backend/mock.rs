//! Mock issuance backend for integration tests.
//!
//! Responses are queued ahead of time and consumed in order; once the queue
//! is empty the mock accepts every request and echoes its frequency, which is
//! what a well-behaved backend does.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use attendance_core::{now_epoch_ms, IssueRequest, IssueResponse, WireTimestamp};
use uuid::Uuid;

use crate::application::issue_session::{BackendError, SessionBackend};

/// Lifetime of links issued by the default accepting response.
const DEFAULT_LINK_TTL_MS: i64 = 10 * 60 * 1_000;

/// A scripted [`SessionBackend`].
#[derive(Default)]
pub struct MockBackend {
    queued: Mutex<VecDeque<Result<IssueResponse, BackendError>>>,
    requests: Mutex<Vec<IssueRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result returned by the next unanswered request.
    pub fn push_response(&self, response: Result<IssueResponse, BackendError>) {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<IssueRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl SessionBackend for MockBackend {
    async fn create_link(&self, request: &IssueRequest) -> Result<IssueResponse, BackendError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        queued.unwrap_or_else(|| {
            let now = now_epoch_ms();
            let mut response = IssueResponse::accepted(
                Uuid::new_v4().to_string(),
                WireTimestamp::EpochMs(now + DEFAULT_LINK_TTL_MS),
            );
            response.issued_at = Some(WireTimestamp::EpochMs(now));
            response.frequency_hz = Some(request.frequency_hz.hz());
            Ok(response)
        })
    }
}
