//! Integration tests for HMAC-SHA256 payload signing.
//!
//! Drives the real signing path through the synchronous endpoint probe and
//! verifies the signature scheme from the receiver's side.

#![cfg(feature = "integration")]

mod common;

use common::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use veltra_webhooks::crypto::{compute_hmac_signature, verify_hmac_signature};

/// Test: the probe carries all delivery headers, including the signature.
#[tokio::test]
async fn test_probe_carries_signature_headers() {
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

    let captured = &capture.requests()[0];
    assert!(captured.header("x-webhook-signature").is_some());
    assert!(captured.header("x-webhook-timestamp").is_some());
    assert_eq!(captured.header("x-webhook-event"), Some("endpoint.test"));
    assert!(captured.header("x-delivery-id").is_some());
    assert_eq!(captured.header("content-type"), Some("application/json"));
}

/// Test: signature format is sha256={64 hex characters}.
#[tokio::test]
async fn test_signature_format_sha256_hex() {
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
    let signature = captured.header("x-webhook-signature").unwrap();

    assert!(signature.starts_with("sha256="));
    let hex_part = &signature[7..];
    assert_eq!(hex_part.len(), 64);
    assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
}

/// Test: the receiver can verify the signature over `timestamp + "." + body`.
#[tokio::test]
async fn test_receiver_can_verify_signature() {
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
    assert!(
        verify_captured_signature(captured, SECRET_1),
        "Signature verification should succeed with the endpoint's secret"
    );

    // Also verify through the crypto module directly.
    let timestamp = captured.header("x-webhook-timestamp").unwrap();
    let expected = compute_hmac_signature(SECRET_1, timestamp, &captured.body);
    assert!(verify_hmac_signature(&expected, SECRET_1, timestamp, &captured.body));
}

/// Test: verification fails with the wrong secret.
#[tokio::test]
async fn test_wrong_secret_fails_verification() {
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
    assert!(!verify_captured_signature(captured, SECRET_2));
}

/// Test: after rotation the old secret no longer verifies new deliveries.
#[tokio::test]
async fn test_rotated_secret_invalidates_old_one() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let service = test_delivery_service();
    let url = format!("{}/webhook", mock_server.uri());

    // First delivery under SECRET_1, then the endpoint is re-read with
    // SECRET_2 as rotation would leave it.
    let before = make_endpoint(TENANT_A, &url, SECRET_1);
    service.probe_endpoint(&before).await;

    let after = make_endpoint(TENANT_A, &url, SECRET_2);
    service.probe_endpoint(&after).await;

    let requests = capture.requests();
    assert_eq!(requests.len(), 2);

    assert!(verify_captured_signature(&requests[0], SECRET_1));
    assert!(verify_captured_signature(&requests[1], SECRET_2));
    assert!(!verify_captured_signature(&requests[1], SECRET_1));
}

/// Test: two payloads never share a signature even under the same secret.
#[tokio::test]
async fn test_signatures_differ_per_payload() {
    let body_a = br#"{"event":"lead.created"}"#;
    let body_b = br#"{"event":"invoice.paid"}"#;

    let sig_a = compute_hmac_signature(SECRET_1, "1700000000", body_a);
    let sig_b = compute_hmac_signature(SECRET_1, "1700000000", body_b);
    assert_ne!(sig_a, sig_b);

    // Same body, different timestamp also differs.
    let sig_c = compute_hmac_signature(SECRET_1, "1700000001", body_a);
    assert_ne!(sig_a, sig_c);
}
