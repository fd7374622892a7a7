//! Request and response bodies of the issuance call.
//!
//! # Field naming
//!
//! The backend speaks camelCase JSON (`linkId`, `expiresAt`).  The Rust
//! structs use snake_case fields and `#[serde(rename_all = "camelCase")]`
//! translates between the two.
//!
//! # Timestamps
//!
//! `expiresAt` (and the optional `issuedAt`) may arrive either as an
//! ISO-8601/RFC 3339 string or as a number of milliseconds since the Unix
//! epoch.  [`WireTimestamp`] accepts both shapes and normalises them to epoch
//! milliseconds.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::frequency::FrequencyHz;

/// Error produced while interpreting an issuance response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseError {
    /// The backend answered `success: false`.  The message is the backend's
    /// `error` field verbatim when present.
    #[error("{0}")]
    Rejected(String),
    /// A field required on success was absent.
    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),
    /// A timestamp field could not be parsed.
    #[error("response field `{field}` has an unparseable timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
    /// The backend echoed a frequency different from the one requested.
    #[error("backend echoed frequency {echoed} Hz but {requested} Hz was requested")]
    FrequencyMismatch { requested: u32, echoed: u32 },
}

/// Message used when the backend fails without an `error` field.
const UNSPECIFIED_REJECTION: &str = "the server rejected the attendance request";

/// Body of the issuance request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub issuer_id: String,
    pub course_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub frequency_hz: FrequencyHz,
}

/// A timestamp as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    /// Milliseconds since the Unix epoch.
    EpochMs(i64),
    /// RFC 3339 text (e.g. `2024-05-01T09:10:00.000Z`).
    Text(String),
}

impl WireTimestamp {
    /// Normalises the timestamp to epoch milliseconds.
    ///
    /// Text without a UTC offset is interpreted as UTC.  Text that is a bare
    /// integer is treated as epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::InvalidTimestamp`] naming `field` when the text
    /// matches none of the accepted shapes.
    pub fn to_epoch_ms(&self, field: &'static str) -> Result<i64, ResponseError> {
        match self {
            WireTimestamp::EpochMs(ms) => Ok(*ms),
            WireTimestamp::Text(text) => {
                let trimmed = text.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                    return Ok(dt.timestamp_millis());
                }
                if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
                    return Ok(naive.and_utc().timestamp_millis());
                }
                if let Ok(ms) = trimmed.parse::<i64>() {
                    return Ok(ms);
                }
                Err(ResponseError::InvalidTimestamp {
                    field,
                    value: text.clone(),
                })
            }
        }
    }
}

/// Body of the issuance response, success or failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<WireTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<WireTimestamp>,
    /// Some backends echo the frequency they bound to the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The authoritative fields of a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedLink {
    pub link_id: String,
    pub expires_at_epoch_ms: i64,
    /// `None` when the backend did not report an issue time.
    pub issued_at_epoch_ms: Option<i64>,
}

impl IssueResponse {
    /// Builds a success response; used by test doubles and the mock backend.
    pub fn accepted(link_id: impl Into<String>, expires_at: WireTimestamp) -> Self {
        Self {
            success: true,
            link_id: Some(link_id.into()),
            expires_at: Some(expires_at),
            ..Self::default()
        }
    }

    /// Builds a failure response carrying `error`.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Interprets the response for a request that asked for `requested`.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Rejected`] for `success: false`.
    /// - [`ResponseError::MissingField`] when `linkId` or `expiresAt` is absent
    ///   or `linkId` is empty.
    /// - [`ResponseError::InvalidTimestamp`] for unparseable timestamps.
    /// - [`ResponseError::FrequencyMismatch`] when an echoed frequency differs.
    pub fn into_issued_link(self, requested: FrequencyHz) -> Result<IssuedLink, ResponseError> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_REJECTION.to_string());
            return Err(ResponseError::Rejected(message));
        }

        let link_id = self
            .link_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ResponseError::MissingField("linkId"))?;
        let expires_at_epoch_ms = self
            .expires_at
            .ok_or(ResponseError::MissingField("expiresAt"))?
            .to_epoch_ms("expiresAt")?;
        let issued_at_epoch_ms = self
            .issued_at
            .map(|ts| ts.to_epoch_ms("issuedAt"))
            .transpose()?;

        if let Some(echoed) = self.frequency_hz {
            if echoed != requested.hz() {
                return Err(ResponseError::FrequencyMismatch {
                    requested: requested.hz(),
                    echoed,
                });
            }
        }

        Ok(IssuedLink {
            link_id,
            expires_at_epoch_ms,
            issued_at_epoch_ms,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
