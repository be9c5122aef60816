//! Registry-time validation for webhook endpoint configuration.
//!
//! Validates target URLs (HTTPS requirement plus SSRF protection against
//! private/internal addresses), subscribed event types against the catalog,
//! retry/timeout bounds, and the custom header map shape. All of these are
//! configuration errors: rejected synchronously, never persisted.

use std::net::IpAddr;

use crate::error::WebhookError;
use crate::models::WebhookEventType;

/// Allowed per-attempt timeout range in seconds.
pub const TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<i32> = 5..=120;

/// Allowed automatic retry budget.
pub const MAX_RETRIES_RANGE: std::ops::RangeInclusive<i32> = 0..=10;

/// Header names owned by the delivery protocol. Custom headers may not shadow
/// them; a duplicate would appear twice on the wire.
const RESERVED_HEADER_NAMES: &[&str] = &[
    "content-type",
    "x-webhook-timestamp",
    "x-webhook-signature",
    "x-webhook-event",
    "x-delivery-id",
];

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Validate a webhook delivery URL.
///
/// Checks:
/// 1. URL is parseable
/// 2. Scheme is HTTPS (or HTTP if `allow_http` is true for dev/test)
/// 3. Host is not a private/internal address (SSRF protection)
pub fn validate_webhook_url(url: &str, allow_http: bool) -> Result<(), WebhookError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| WebhookError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(WebhookError::InvalidUrl(
                "Webhook URLs must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(WebhookError::InvalidUrl(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| WebhookError::InvalidUrl("URL must have a host".to_string()))?;

    validate_host_not_internal(host)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate that a host is not a private/internal address.
///
/// Blocks:
/// - Loopback addresses (127.0.0.0/8)
/// - Private networks (10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16)
/// - Link-local (169.254.0.0/16, the cloud metadata endpoint range)
/// - CGNAT (100.64.0.0/10)
/// - IPv6 loopback and unspecified
/// - Internal hostnames (localhost, *.internal, *.local)
pub fn validate_host_not_internal(host: &str) -> Result<(), WebhookError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_internal_ip(&ip) {
            return Err(WebhookError::SsrfDetected(format!(
                "Destination host {host} is a private/internal address"
            )));
        }
    }

    let lower = host.to_ascii_lowercase();
    if lower == "localhost"
        || lower == "metadata.google.internal"
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(WebhookError::SsrfDetected(format!(
            "Destination host {host} is a restricted internal hostname"
        )));
    }

    Ok(())
}

/// Check if an IP address belongs to a private/internal range.
fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()                // 127.0.0.0/8
                || v4.is_private()          // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
                || v4.is_link_local()       // 169.254.0.0/16
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64) // 100.64.0.0/10 (CGNAT)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Event type validation
// ---------------------------------------------------------------------------

/// Validate that the subscribed set is non-empty and every entry is a known
/// `WebhookEventType`.
pub fn validate_event_types(event_types: &[String]) -> Result<(), WebhookError> {
    if event_types.is_empty() {
        return Err(WebhookError::Validation(
            "At least one event type must be subscribed".to_string(),
        ));
    }
    for et in event_types {
        if WebhookEventType::parse(et).is_none() {
            return Err(WebhookError::Validation(format!(
                "Unknown event type: {et}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bounds and header map validation
// ---------------------------------------------------------------------------

/// Validate the per-attempt timeout.
pub fn validate_timeout_secs(timeout_secs: i32) -> Result<(), WebhookError> {
    if !TIMEOUT_SECS_RANGE.contains(&timeout_secs) {
        return Err(WebhookError::Validation(format!(
            "timeout_secs must be between {} and {}",
            TIMEOUT_SECS_RANGE.start(),
            TIMEOUT_SECS_RANGE.end()
        )));
    }
    Ok(())
}

/// Validate the automatic retry budget.
pub fn validate_max_retries(max_retries: i32) -> Result<(), WebhookError> {
    if !MAX_RETRIES_RANGE.contains(&max_retries) {
        return Err(WebhookError::Validation(format!(
            "max_retries must be between {} and {}",
            MAX_RETRIES_RANGE.start(),
            MAX_RETRIES_RANGE.end()
        )));
    }
    Ok(())
}

/// Validate that custom headers form a flat string-to-string map with names
/// and values `reqwest` will accept at delivery time.
pub fn validate_custom_headers(headers: &serde_json::Value) -> Result<(), WebhookError> {
    let map = headers.as_object().ok_or_else(|| {
        WebhookError::Validation("custom_headers must be a JSON object".to_string())
    })?;

    for (name, value) in map {
        if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(WebhookError::Validation(format!(
                "Invalid header name: {name}"
            )));
        }
        if RESERVED_HEADER_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(WebhookError::Validation(format!(
                "Header {name} is reserved for delivery metadata"
            )));
        }
        let Some(v) = value.as_str() else {
            return Err(WebhookError::Validation(format!(
                "Header {name} must have a string value"
            )));
        };
        if reqwest::header::HeaderValue::from_str(v).is_err() {
            return Err(WebhookError::Validation(format!(
                "Invalid value for header {name}"
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // --- URL validation ---

    #[test]
    fn test_valid_https_url() {
        assert!(validate_webhook_url("https://example.com/webhooks", false).is_ok());
    }

    #[test]
    fn test_valid_https_url_with_port() {
        assert!(validate_webhook_url("https://hooks.example.com:8443/callback", false).is_ok());
    }

    #[test]
    fn test_http_url_rejected_in_production() {
        let result = validate_webhook_url("http://example.com/webhooks", false);
        assert!(matches!(result.unwrap_err(), WebhookError::InvalidUrl(_)));
    }

    #[test]
    fn test_http_url_allowed_in_dev() {
        assert!(validate_webhook_url("http://example.com/webhooks", true).is_ok());
    }

    #[test]
    fn test_invalid_url_format() {
        assert!(validate_webhook_url("not-a-url", false).is_err());
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(validate_webhook_url("ftp://example.com/webhooks", false).is_err());
    }

    // --- SSRF protection ---

    #[test]
    fn test_ssrf_blocks_loopback() {
        assert!(validate_host_not_internal("127.0.0.1").is_err());
        assert!(validate_host_not_internal("127.0.0.2").is_err());
    }

    #[test]
    fn test_ssrf_blocks_private_ranges() {
        assert!(validate_host_not_internal("10.0.0.1").is_err());
        assert!(validate_host_not_internal("172.16.0.1").is_err());
        assert!(validate_host_not_internal("192.168.0.1").is_err());
    }

    #[test]
    fn test_ssrf_blocks_link_local() {
        // cloud metadata endpoint
        assert!(validate_host_not_internal("169.254.169.254").is_err());
    }

    #[test]
    fn test_ssrf_blocks_cgnat() {
        assert!(validate_host_not_internal("100.64.0.1").is_err());
        assert!(validate_host_not_internal("100.127.255.255").is_err());
    }

    #[test]
    fn test_ssrf_blocks_ipv6_loopback_and_unspecified() {
        assert!(validate_host_not_internal("::1").is_err());
        assert!(validate_host_not_internal("::").is_err());
    }

    #[test]
    fn test_ssrf_blocks_internal_hostnames() {
        assert!(validate_host_not_internal("localhost").is_err());
        assert!(validate_host_not_internal("LOCALHOST").is_err());
        assert!(validate_host_not_internal("metadata.google.internal").is_err());
        assert!(validate_host_not_internal("service.internal").is_err());
        assert!(validate_host_not_internal("myhost.local").is_err());
    }

    #[test]
    fn test_ssrf_allows_public_hosts() {
        assert!(validate_host_not_internal("8.8.8.8").is_ok());
        assert!(validate_host_not_internal("example.com").is_ok());
        assert!(validate_host_not_internal("hooks.myapp.io").is_ok());
    }

    #[test]
    fn test_ssrf_url_integration_private_ip() {
        let result = validate_webhook_url("https://10.0.0.1/webhook", false);
        assert!(matches!(result.unwrap_err(), WebhookError::SsrfDetected(_)));
    }

    // --- Event type validation ---

    #[test]
    fn test_valid_event_types() {
        let types = vec![
            "lead.created".to_string(),
            "quotation.accepted".to_string(),
            "invoice.paid".to_string(),
        ];
        assert!(validate_event_types(&types).is_ok());
    }

    #[test]
    fn test_invalid_event_type() {
        let types = vec!["lead.created".to_string(), "invalid.event.type".to_string()];
        let result = validate_event_types(&types);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("invalid.event.type"));
    }

    #[test]
    fn test_empty_event_types_rejected() {
        let result = validate_event_types(&[]);
        assert!(matches!(result.unwrap_err(), WebhookError::Validation(_)));
    }

    #[test]
    fn test_all_catalog_types_valid() {
        let types: Vec<String> = WebhookEventType::all()
            .iter()
            .map(|et| et.as_str().to_string())
            .collect();
        assert!(validate_event_types(&types).is_ok());
    }

    // --- Bounds ---

    #[test]
    fn test_timeout_bounds() {
        assert!(validate_timeout_secs(5).is_ok());
        assert!(validate_timeout_secs(30).is_ok());
        assert!(validate_timeout_secs(120).is_ok());
        assert!(validate_timeout_secs(4).is_err());
        assert!(validate_timeout_secs(121).is_err());
        assert!(validate_timeout_secs(0).is_err());
    }

    #[test]
    fn test_max_retries_bounds() {
        assert!(validate_max_retries(0).is_ok());
        assert!(validate_max_retries(10).is_ok());
        assert!(validate_max_retries(-1).is_err());
        assert!(validate_max_retries(11).is_err());
    }

    // --- Custom headers ---

    #[test]
    fn test_custom_headers_valid() {
        let headers = json!({"X-Api-Key": "abc123", "X-Source": "veltra"});
        assert!(validate_custom_headers(&headers).is_ok());
    }

    #[test]
    fn test_custom_headers_empty_object() {
        assert!(validate_custom_headers(&json!({})).is_ok());
    }

    #[test]
    fn test_custom_headers_not_object() {
        assert!(validate_custom_headers(&json!(["a", "b"])).is_err());
        assert!(validate_custom_headers(&json!("string")).is_err());
    }

    #[test]
    fn test_custom_headers_non_string_value() {
        assert!(validate_custom_headers(&json!({"X-Count": 5})).is_err());
        assert!(validate_custom_headers(&json!({"X-Nested": {"a": 1}})).is_err());
    }

    #[test]
    fn test_custom_headers_reserved_names_rejected() {
        for name in [
            "Content-Type",
            "content-type",
            "X-Webhook-Signature",
            "x-webhook-timestamp",
            "X-Webhook-Event",
            "X-Delivery-Id",
        ] {
            let result = validate_custom_headers(&json!({ name: "v" }));
            assert!(
                matches!(result, Err(WebhookError::Validation(_))),
                "{name} should be rejected as reserved"
            );
        }
    }

    #[test]
    fn test_custom_headers_invalid_name() {
        assert!(validate_custom_headers(&json!({"bad header": "v"})).is_err());
    }
}
