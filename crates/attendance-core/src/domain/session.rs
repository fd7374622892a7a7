//! Server-issued attendance sessions and the student redemption link.
//!
//! The backend is authoritative for the link identifier and the session's
//! time window.  The client never computes an expiry length of its own; it
//! only *observes* whether `now >= expires_at_epoch_ms`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::frequency::FrequencyHz;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// An attendance session returned by a successful issuance call.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub issuer_id: String,
    pub course_id: String,
    pub link_id: String,
    pub frequency_hz: FrequencyHz,
    pub latitude: f64,
    pub longitude: f64,
    pub issued_at_epoch_ms: i64,
    pub expires_at_epoch_ms: i64,
}

impl AttendanceSession {
    /// Returns `true` once `now_ms` has reached the expiry instant.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_epoch_ms
    }

    /// Milliseconds remaining until expiry, saturating at zero.
    pub fn remaining_ms_at(&self, now_ms: i64) -> i64 {
        (self.expires_at_epoch_ms - now_ms).max(0)
    }

    /// Builds the redemption link handed to the student-side flow.
    pub fn redemption_link(&self, domain: &str, path_prefix: &str) -> RedemptionLink {
        RedemptionLink::build(domain, path_prefix, &self.course_id, &self.link_id)
    }
}

/// The student-facing URL that redeems an attendance session.
///
/// Shape: `{domain}{path_prefix}/courses/{course_id}/mark_attendance?linkId={link_id}`.
/// The identifiers are opaque and percent-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionLink(String);

impl RedemptionLink {
    /// Builds the link from its parts.
    ///
    /// A trailing `/` on `domain` and leading/trailing `/` on `path_prefix`
    /// are normalised so the result never contains `//` in the path.
    pub fn build(domain: &str, path_prefix: &str, course_id: &str, link_id: &str) -> Self {
        let domain = domain.trim_end_matches('/');
        let prefix = path_prefix.trim_matches('/');
        let mut url = String::with_capacity(domain.len() + prefix.len() + 64);
        url.push_str(domain);
        if !prefix.is_empty() {
            url.push('/');
            url.push_str(prefix);
        }
        url.push_str("/courses/");
        url.push_str(&urlencoding::encode(course_id));
        url.push_str("/mark_attendance?linkId=");
        url.push_str(&urlencoding::encode(link_id));
        Self(url)
    }

    /// The link as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RedemptionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
