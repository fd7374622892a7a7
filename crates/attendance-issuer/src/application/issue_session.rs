//! SessionIssuer: one round-trip to the backend for an attendance link.
//!
//! # Authority
//!
//! The backend is authoritative for `linkId`, `issuedAt` and `expiresAt`.
//! The issuer never computes an expiry length; when the backend omits
//! `issuedAt`, the local receipt time stands in for it.
//!
//! # Failure policy
//!
//! Exactly one request is sent per call.  Every failure is classified into
//! an [`IssuanceError`] and returned; there is no retry.  A rejected
//! response surfaces the backend's `error` text verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use attendance_core::{now_epoch_ms, AttendanceSession, FrequencyHz, IssueRequest, IssueResponse, ResponseError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Transport-level failure talking to the backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("backend is unreachable: {0}")]
    Unreachable(String),
    #[error("backend did not answer within {0}ms")]
    Timeout(u64),
    #[error("backend answered HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("backend response is not valid JSON: {0}")]
    Decode(String),
    #[error("backend endpoint is invalid: {0}")]
    InvalidEndpoint(String),
}

/// Trait abstracting the backend issuance endpoint.
///
/// Infrastructure implementations live in `infrastructure::backend`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Sends one issuance request and returns the decoded response body.
    ///
    /// A well-formed `{success: false}` body is returned as `Ok`, whatever
    /// the HTTP status; only transport and decode failures are `Err`.
    async fn create_link(&self, request: &IssueRequest) -> Result<IssueResponse, BackendError>;
}

/// Error type for the issue-session use case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IssuanceError {
    /// The request was not sent because an argument is invalid.
    #[error("invalid issuance request: {0}")]
    Validation(String),
    /// The backend answered `success: false`; carries its message verbatim.
    #[error("{0}")]
    Rejected(String),
    /// The backend could not be reached or did not answer in time.
    #[error("{0}")]
    Unreachable(String),
    /// The backend answered with something that is not a usable response.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl From<BackendError> for IssuanceError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unreachable(_) | BackendError::Timeout(_) => {
                IssuanceError::Unreachable(e.to_string())
            }
            BackendError::InvalidEndpoint(_) => IssuanceError::Validation(e.to_string()),
            BackendError::Status { .. } | BackendError::Decode(_) => {
                IssuanceError::InvalidResponse(e.to_string())
            }
        }
    }
}

impl From<ResponseError> for IssuanceError {
    fn from(e: ResponseError) -> Self {
        match e {
            ResponseError::Rejected(message) => IssuanceError::Rejected(message),
            other => IssuanceError::InvalidResponse(other.to_string()),
        }
    }
}

/// The Session Issuer.
pub struct SessionIssuer {
    backend: Arc<dyn SessionBackend>,
}

impl SessionIssuer {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Requests an attendance link bound to the given issuer, course,
    /// location and frequency.
    ///
    /// # Errors
    ///
    /// - [`IssuanceError::Validation`] for empty ids or out-of-range
    ///   coordinates (no request is sent).
    /// - [`IssuanceError::Rejected`] with the backend's message.
    /// - [`IssuanceError::Unreachable`] / [`IssuanceError::InvalidResponse`]
    ///   for transport and protocol failures.
    pub async fn issue(
        &self,
        issuer_id: &str,
        course_id: &str,
        latitude: f64,
        longitude: f64,
        frequency: FrequencyHz,
    ) -> Result<AttendanceSession, IssuanceError> {
        validate(issuer_id, course_id, latitude, longitude)?;

        let request = IssueRequest {
            issuer_id: issuer_id.to_string(),
            course_id: course_id.to_string(),
            latitude,
            longitude,
            frequency_hz: frequency,
        };
        debug!(course_id, %frequency, "sending issuance request");

        let response = self.backend.create_link(&request).await.map_err(|e| {
            warn!(course_id, "issuance round-trip failed: {e}");
            IssuanceError::from(e)
        })?;
        let received_at = now_epoch_ms();

        let link = response.into_issued_link(frequency).map_err(|e| {
            warn!(course_id, "issuance rejected: {e}");
            IssuanceError::from(e)
        })?;

        let session = AttendanceSession {
            issuer_id: request.issuer_id,
            course_id: request.course_id,
            link_id: link.link_id,
            frequency_hz: frequency,
            latitude,
            longitude,
            issued_at_epoch_ms: link.issued_at_epoch_ms.unwrap_or(received_at),
            expires_at_epoch_ms: link.expires_at_epoch_ms,
        };
        info!(
            course_id = %session.course_id,
            link_id = %session.link_id,
            expires_at_epoch_ms = session.expires_at_epoch_ms,
            "attendance session issued"
        );
        Ok(session)
    }
}

fn validate(issuer_id: &str, course_id: &str, latitude: f64, longitude: f64) -> Result<(), IssuanceError> {
    if issuer_id.trim().is_empty() {
        return Err(IssuanceError::Validation("issuer id must not be empty".to_string()));
    }
    if course_id.trim().is_empty() {
        return Err(IssuanceError::Validation("course id must not be empty".to_string()));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(IssuanceError::Validation(format!(
            "latitude {latitude} is outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(IssuanceError::Validation(format!(
            "longitude {longitude} is outside [-180, 180]"
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
