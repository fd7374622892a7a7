//! HTTP issuance backend.
//!
//! Sends the [`IssueRequest`] as a JSON body to `{base_url}{issue_path}` and
//! decodes the [`IssueResponse`] envelope.
//!
//! # Status codes
//!
//! Backends commonly answer a rejection with a 4xx status *and* a
//! `{success: false, error}` body.  The body is what carries the
//! user-facing message, so it is decoded whatever the status.  Only a non-2xx
//! response whose body is not a valid envelope becomes
//! [`BackendError::Status`].
//!
//! Only plain `http://` endpoints are supported; TLS termination is expected
//! in front of the issuer (reverse proxy or local gateway).

use std::time::Duration;

use async_trait::async_trait;
use attendance_core::{IssueRequest, IssueResponse};
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, Uri};
use tracing::{debug, warn};

use crate::application::issue_session::{BackendError, SessionBackend};

/// Longest response body echoed into a [`BackendError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// [`SessionBackend`] speaking JSON over HTTP/1.1.
pub struct HttpSessionBackend {
    client: Client<HttpConnector>,
    endpoint: Uri,
    timeout: Duration,
}

impl HttpSessionBackend {
    /// Creates a backend posting to `base_url` joined with `issue_path`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidEndpoint`] when the joined URL does not
    /// parse or is not `http://`.
    pub fn new(base_url: &str, issue_path: &str, timeout: Duration) -> Result<Self, BackendError> {
        let joined = join_url(base_url, issue_path);
        let endpoint: Uri = joined
            .parse()
            .map_err(|e| BackendError::InvalidEndpoint(format!("{joined}: {e}")))?;
        if endpoint.scheme_str() != Some("http") || endpoint.host().is_none() {
            return Err(BackendError::InvalidEndpoint(format!(
                "{joined}: only http:// URLs with a host are supported"
            )));
        }
        Ok(Self {
            client: Client::new(),
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn create_link(&self, request: &IssueRequest) -> Result<IssueResponse, BackendError> {
        let json = serde_json::to_string(request).map_err(|e| BackendError::Decode(e.to_string()))?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .body(Body::from(json))
            .map_err(|e| BackendError::InvalidEndpoint(e.to_string()))?;

        debug!(endpoint = %self.endpoint, "posting issuance request");
        let timeout_ms = self.timeout.as_millis() as u64;
        let round_trip = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| BackendError::Unreachable(e.to_string()))?;
            let status = resp.status();
            let body = hyper::body::to_bytes(resp.into_body())
                .await
                .map_err(|e| BackendError::Unreachable(e.to_string()))?;
            Ok::<_, BackendError>((status, body))
        };
        let (status, body) = tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| BackendError::Timeout(timeout_ms))??;

        debug!(status = status.as_u16(), bytes = body.len(), "issuance response received");
        match serde_json::from_slice::<IssueResponse>(&body) {
            Ok(response) => {
                if !status.is_success() && response.success {
                    warn!(status = status.as_u16(), "backend reported success with an error status");
                    return Err(BackendError::Status {
                        code: status.as_u16(),
                        body: truncate(&String::from_utf8_lossy(&body)),
                    });
                }
                Ok(response)
            }
            Err(e) if status.is_success() => Err(BackendError::Decode(e.to_string())),
            Err(_) => Err(BackendError::Status {
                code: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&body)),
            }),
        }
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
