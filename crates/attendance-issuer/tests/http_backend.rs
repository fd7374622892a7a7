//! Integration tests for `HttpSessionBackend` against a local hyper server.
//!
//! Each test binds a throwaway HTTP/1.1 server on `127.0.0.1:0` that answers
//! every request with a canned status and body, and records what it received.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attendance_core::{FrequencyHz, IssueRequest};
use attendance_issuer::application::issue_session::{
    BackendError, IssuanceError, SessionBackend, SessionIssuer,
};
use attendance_issuer::infrastructure::backend::HttpSessionBackend;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};

const ISSUE_PATH: &str = "/api/attendance/links";

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
}

impl Canned {
    fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
        }
    }
}

/// `(path, body)` of every request the server received.
type Received = Arc<Mutex<Vec<(String, String)>>>;

fn spawn_server(canned: Canned) -> (SocketAddr, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&received);

    let make_svc = make_service_fn(move |_conn| {
        let canned = canned.clone();
        let seen = Arc::clone(&seen);
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let canned = canned.clone();
                let seen = Arc::clone(&seen);
                async move {
                    let path = req.uri().path().to_string();
                    let bytes = hyper::body::to_bytes(req.into_body()).await?;
                    seen.lock()
                        .unwrap()
                        .push((path, String::from_utf8_lossy(&bytes).into_owned()));
                    tokio::time::sleep(canned.delay).await;
                    let mut resp = Response::new(Body::from(canned.body));
                    *resp.status_mut() = canned.status;
                    Ok::<_, hyper::Error>(resp)
                }
            }))
        }
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    (addr, received)
}

fn backend_for(addr: SocketAddr, timeout: Duration) -> HttpSessionBackend {
    HttpSessionBackend::new(&format!("http://{addr}"), ISSUE_PATH, timeout).unwrap()
}

fn request() -> IssueRequest {
    IssueRequest {
        issuer_id: "prof-han".to_string(),
        course_id: "CS101".to_string(),
        latitude: 37.55,
        longitude: 126.99,
        frequency_hz: FrequencyHz::new(19_200).unwrap(),
    }
}

// ── Success ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_success_envelope_is_decoded() {
    // Arrange
    let (addr, received) = spawn_server(Canned::new(
        StatusCode::OK,
        r#"{"success":true,"linkId":"lnk-42","expiresAt":"2030-01-01T09:00:00Z","frequencyHz":19200}"#,
    ));
    let backend = backend_for(addr, Duration::from_secs(2));

    // Act
    let response = backend.create_link(&request()).await.unwrap();

    // Assert
    assert!(response.success);
    assert_eq!(response.link_id.as_deref(), Some("lnk-42"));
    assert_eq!(response.frequency_hz, Some(19_200));

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, ISSUE_PATH);
    let sent: serde_json::Value = serde_json::from_str(&received[0].1).unwrap();
    assert_eq!(sent["issuerId"], "prof-han");
    assert_eq!(sent["courseId"], "CS101");
    assert_eq!(sent["frequencyHz"], 19_200);
}

#[tokio::test]
async fn test_issuer_builds_session_from_http_response() {
    let (addr, _) = spawn_server(Canned::new(
        StatusCode::CREATED,
        r#"{"success":true,"linkId":"lnk-7","issuedAt":1893488100000,"expiresAt":"2030-01-01T09:00:00Z"}"#,
    ));
    let issuer = SessionIssuer::new(Arc::new(backend_for(addr, Duration::from_secs(2))));

    let session = issuer
        .issue("prof-han", "CS101", 37.55, 126.99, FrequencyHz::new(19_200).unwrap())
        .await
        .unwrap();

    assert_eq!(session.link_id, "lnk-7");
    assert_eq!(session.issued_at_epoch_ms, 1_893_488_100_000);
    assert_eq!(session.expires_at_epoch_ms, 1_893_488_400_000);
    assert_eq!(session.frequency_hz.hz(), 19_200);
}

// ── Failure shapes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_client_error_with_envelope_surfaces_message_verbatim() {
    // Arrange
    let (addr, _) = spawn_server(Canned::new(
        StatusCode::FORBIDDEN,
        r#"{"success":false,"error":"You are not the instructor of CS101"}"#,
    ));
    let issuer = SessionIssuer::new(Arc::new(backend_for(addr, Duration::from_secs(2))));

    // Act
    let err = issuer
        .issue("prof-han", "CS101", 37.55, 126.99, FrequencyHz::new(19_200).unwrap())
        .await
        .unwrap_err();

    // Assert
    assert_eq!(
        err,
        IssuanceError::Rejected("You are not the instructor of CS101".to_string())
    );
}

#[tokio::test]
async fn test_server_error_without_envelope_reports_status() {
    let (addr, _) = spawn_server(Canned::new(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded"));
    let backend = backend_for(addr, Duration::from_secs(2));

    let err = backend.create_link(&request()).await.unwrap_err();

    assert_eq!(
        err,
        BackendError::Status {
            code: 500,
            body: "upstream exploded".to_string()
        }
    );
}

#[tokio::test]
async fn test_ok_status_with_garbage_body_is_a_decode_error() {
    let (addr, _) = spawn_server(Canned::new(StatusCode::OK, "<html>maintenance</html>"));
    let backend = backend_for(addr, Duration::from_secs(2));

    let err = backend.create_link(&request()).await.unwrap_err();

    assert!(matches!(err, BackendError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_success_body_with_error_status_is_not_trusted() {
    let (addr, _) = spawn_server(Canned::new(
        StatusCode::BAD_GATEWAY,
        r#"{"success":true,"linkId":"x","expiresAt":1}"#,
    ));
    let backend = backend_for(addr, Duration::from_secs(2));

    let err = backend.create_link(&request()).await.unwrap_err();

    assert!(matches!(err, BackendError::Status { code: 502, .. }));
}

// ── Transport ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_slow_server_times_out() {
    let (addr, _) = spawn_server(Canned {
        delay: Duration::from_secs(5),
        ..Canned::new(StatusCode::OK, r#"{"success":true}"#)
    });
    let backend = backend_for(addr, Duration::from_millis(200));

    let err = backend.create_link(&request()).await.unwrap_err();

    assert_eq!(err, BackendError::Timeout(200));
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    // Arrange: grab a free port, then release it so nothing is listening
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let backend = backend_for(SocketAddr::from(([127, 0, 0, 1], port)), Duration::from_secs(2));

    // Act
    let err = backend.create_link(&request()).await.unwrap_err();

    // Assert
    assert!(matches!(err, BackendError::Unreachable(_)), "got {err:?}");
}
