//! Integration tests for the synchronous endpoint probe.
//!
//! The probe shares the signing and HTTP path with real deliveries but is
//! fire-once: it writes nothing to the ledger and never retries.

#![cfg(feature = "integration")]

mod common;

use common::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

/// Test: a 200 response yields a successful probe result.
#[tokio::test]
async fn test_probe_success() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let endpoint = make_endpoint(TENANT_A, &format!("{}/webhook", mock_server.uri()), SECRET_1);

    let result = service.probe_endpoint(&endpoint).await;

    assert!(result.success);
    assert_eq!(result.http_status, Some(200));
    assert!(result.error.is_none());
    assert_eq!(capture.request_count(), 1);
}

/// Test: the probe body is a well-formed payload with the test event type.
#[tokio::test]
async fn test_probe_payload_shape() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let endpoint = make_endpoint(TENANT_A, &format!("{}/webhook", mock_server.uri()), SECRET_1);
    service.probe_endpoint(&endpoint).await;

    let captured = &capture.requests()[0];
    let payload: WebhookPayload = captured.body_json().unwrap();

    assert_eq!(payload.event_type, "endpoint.test");
    assert_eq!(payload.tenant_id, TENANT_A);
    assert!(payload.data.get("endpoint_id").is_some());
}

/// Test: a 5xx response is reported as a failure with the status code.
#[tokio::test]
async fn test_probe_reports_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(CaptureResponder::with_status(500))
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let endpoint = make_endpoint(TENANT_A, &format!("{}/webhook", mock_server.uri()), SECRET_1);

    let result = service.probe_endpoint(&endpoint).await;

    assert!(!result.success);
    assert_eq!(result.http_status, Some(500));
    assert_eq!(result.error.as_deref(), Some("HTTP 500"));
}

/// Test: a 4xx response is a failure, same as for real deliveries.
#[tokio::test]
async fn test_probe_reports_client_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(CaptureResponder::with_status(404))
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let endpoint = make_endpoint(TENANT_A, &format!("{}/webhook", mock_server.uri()), SECRET_1);

    let result = service.probe_endpoint(&endpoint).await;

    assert!(!result.success);
    assert_eq!(result.http_status, Some(404));
}

/// Test: an unreachable receiver yields a failure with no HTTP status.
#[tokio::test]
async fn test_probe_reports_connection_failure() {
    // Nothing listens on this port.
    let service = test_delivery_service();
    let endpoint = make_endpoint(TENANT_A, "http://127.0.0.1:1/webhook", SECRET_1);

    let result = service.probe_endpoint(&endpoint).await;

    assert!(!result.success);
    assert_eq!(result.http_status, None);
    assert!(result.error.is_some());
}

/// Test: the probe sends exactly one request, never a retry.
#[tokio::test]
async fn test_probe_never_retries() {
    let mock_server = MockServer::start().await;
    let counter = CountingResponder::with_status(503);

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(counter.clone())
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let endpoint = make_endpoint(TENANT_A, &format!("{}/webhook", mock_server.uri()), SECRET_1);

    let result = service.probe_endpoint(&endpoint).await;
    assert!(!result.success);

    // Allow any queued retry a moment to fire, then confirm none did.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(counter.count(), 1);
}

/// Test: custom headers configured on the endpoint are forwarded.
#[tokio::test]
async fn test_probe_forwards_custom_headers() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let mut endpoint =
        make_endpoint(TENANT_A, &format!("{}/webhook", mock_server.uri()), SECRET_1);
    endpoint.custom_headers = serde_json::json!({
        "X-Api-Key": "abc123",
        "X-Environment": "staging"
    });

    service.probe_endpoint(&endpoint).await;

    let captured = &capture.requests()[0];
    assert_eq!(captured.header("x-api-key"), Some("abc123"));
    assert_eq!(captured.header("x-environment"), Some("staging"));
}

/// Test: an endpoint whose secret cannot be decrypted fails the probe without
/// any HTTP attempt.
#[tokio::test]
async fn test_probe_with_corrupt_secret() {
    let mock_server = MockServer::start().await;
    let counter = CountingResponder::new();

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(counter.clone())
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let mut endpoint =
        make_endpoint(TENANT_A, &format!("{}/webhook", mock_server.uri()), SECRET_1);
    endpoint.secret_encrypted = "not-valid-base64!!!".to_string();

    let result = service.probe_endpoint(&endpoint).await;

    assert!(!result.success);
    assert_eq!(result.http_status, None);
    assert!(result.error.is_some());
    assert_eq!(counter.count(), 0);
}
