//! Webhook delivery execution.
//!
//! The dispatcher fans a domain event out into one delivery record per
//! matching endpoint. The attempt executor signs the payload snapshot,
//! performs the HTTP POST, and advances the record's state machine:
//! 2xx terminates in `sent`; anything else consumes one attempt and either
//! schedules a retry with exponential backoff or terminates in `failed` once
//! the budget (`max_retries + 1` attempts) is exhausted.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::crypto;
use crate::error::WebhookError;
use crate::models::{ProbeResponse, WebhookPayload};
use veltra_db::models::{CreateWebhookDelivery, WebhookDelivery, WebhookEndpoint};

use super::event_publisher::WebhookEvent;

/// Base backoff delay for the first retry, in seconds.
pub const RETRY_BASE_SECS: i64 = 60;

/// Backoff ceiling, in seconds (2 hours).
pub const RETRY_CAP_SECS: i64 = 7200;

/// Upper bound of the uniform jitter added to each backoff delay, in seconds.
pub const RETRY_JITTER_SECS: i64 = 30;

/// Event type used for synchronous endpoint probes. Not part of the catalog;
/// probe attempts are never persisted to the ledger.
pub const PROBE_EVENT_TYPE: &str = "endpoint.test";

const USER_AGENT: &str = "veltra-webhooks/1.0";

/// Service performing webhook dispatch and delivery attempts.
#[derive(Clone)]
pub struct DeliveryService {
    pool: PgPool,
    http_client: reqwest::Client,
    encryption_key: Vec<u8>,
}

impl DeliveryService {
    /// Create a new delivery service.
    ///
    /// Redirects are never followed: a redirect response is a failed attempt,
    /// and following one would bypass URL validation.
    #[must_use]
    pub fn new(pool: PgPool, encryption_key: Vec<u8>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            pool,
            http_client,
            encryption_key,
        }
    }

    /// Fan a domain event out to every active, subscribed endpoint.
    ///
    /// One delivery record is created per matching endpoint, each holding its
    /// own immutable payload snapshot. A failure to create one record is
    /// logged and does not block the rest of the fan-out.
    pub async fn dispatch_event(
        &self,
        event: &WebhookEvent,
    ) -> Result<Vec<WebhookDelivery>, WebhookError> {
        let endpoints =
            WebhookEndpoint::find_active_by_event_type(&self.pool, event.tenant_id, &event.event_type)
                .await?;

        if endpoints.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                event_type = %event.event_type,
                tenant_id = %event.tenant_id,
                "No active endpoints subscribed, event dropped"
            );
            return Ok(Vec::new());
        }

        let payload = WebhookPayload {
            event_id: event.event_id,
            event_type: event.event_type.clone(),
            timestamp: event.timestamp,
            tenant_id: event.tenant_id,
            data: event.data.clone(),
        };
        let payload_json = serde_json::to_value(&payload)
            .map_err(|e| WebhookError::Internal(format!("Failed to serialize payload: {e}")))?;

        let mut deliveries = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            let created = WebhookDelivery::create(
                &self.pool,
                CreateWebhookDelivery {
                    tenant_id: event.tenant_id,
                    endpoint_id: endpoint.id,
                    event_id: event.event_id,
                    event_type: event.event_type.clone(),
                    payload: payload_json.clone(),
                },
            )
            .await;

            match created {
                Ok(delivery) => deliveries.push(delivery),
                Err(e) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        endpoint_id = %endpoint.id,
                        event_id = %event.event_id,
                        error = %e,
                        "Failed to create delivery record"
                    );
                }
            }
        }

        tracing::info!(
            target: "webhook_delivery",
            event_type = %event.event_type,
            event_id = %event.event_id,
            tenant_id = %event.tenant_id,
            deliveries = deliveries.len(),
            "Event dispatched"
        );

        Ok(deliveries)
    }

    /// Process one claimed delivery.
    ///
    /// Re-reads the endpoint so configuration and secret changes take effect
    /// between attempts. An endpoint that disappeared or was deactivated while
    /// the record sat queued releases the claim and leaves the record alone;
    /// the due-scan skips inactive endpoints, so the record simply stops
    /// coming up until the endpoint is reactivated.
    pub async fn process_delivery(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError> {
        let endpoint =
            WebhookEndpoint::find_by_id(&self.pool, delivery.tenant_id, delivery.endpoint_id)
                .await?;

        let Some(endpoint) = endpoint else {
            tracing::warn!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                endpoint_id = %delivery.endpoint_id,
                "Endpoint missing for claimed delivery, releasing claim"
            );
            WebhookDelivery::release_claim(&self.pool, delivery.id).await?;
            return Ok(());
        };

        if !endpoint.is_active {
            WebhookDelivery::release_claim(&self.pool, delivery.id).await?;
            return Ok(());
        }

        self.execute_delivery(delivery, &endpoint).await
    }

    /// Perform one signed HTTP attempt for a claimed delivery and record the
    /// outcome.
    pub async fn execute_delivery(
        &self,
        delivery: &WebhookDelivery,
        endpoint: &WebhookEndpoint,
    ) -> Result<(), WebhookError> {
        // Secret decryption failure is a local defect, not a receiver failure:
        // release the claim without consuming an attempt so an operator can fix
        // the key material and let the record retry intact.
        let secret = match crypto::decrypt_secret(&endpoint.secret_encrypted, &self.encryption_key)
        {
            Ok(secret) => secret,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    delivery_id = %delivery.id,
                    endpoint_id = %endpoint.id,
                    error = %e,
                    "Failed to decrypt endpoint secret, releasing claim"
                );
                WebhookDelivery::release_claim(&self.pool, delivery.id).await?;
                return Ok(());
            }
        };

        let body = serde_json::to_string(&delivery.payload)
            .map_err(|e| WebhookError::Internal(format!("Failed to serialize payload: {e}")))?;

        let outcome = self
            .post_signed(
                &endpoint.url,
                &endpoint.custom_headers,
                endpoint.timeout_secs,
                &secret,
                &delivery.event_type,
                delivery.id,
                &body,
            )
            .await;

        let new_attempts = delivery.attempts + 1;

        match outcome {
            AttemptOutcome::Success { status } => {
                WebhookDelivery::mark_sent(
                    &self.pool,
                    delivery.tenant_id,
                    delivery.id,
                    new_attempts,
                    status,
                )
                .await?;

                tracing::info!(
                    target: "webhook_delivery",
                    delivery_id = %delivery.id,
                    endpoint_id = %endpoint.id,
                    attempts = new_attempts,
                    status = status,
                    "Delivery succeeded"
                );
            }
            AttemptOutcome::Failure { status, error } => {
                if attempts_remaining(new_attempts, endpoint.max_retries) {
                    let next_retry_at = calculate_next_retry_at(new_attempts);
                    WebhookDelivery::mark_retrying(
                        &self.pool,
                        delivery.tenant_id,
                        delivery.id,
                        new_attempts,
                        &error,
                        status,
                        next_retry_at,
                    )
                    .await?;

                    tracing::warn!(
                        target: "webhook_delivery",
                        delivery_id = %delivery.id,
                        endpoint_id = %endpoint.id,
                        attempts = new_attempts,
                        error = %error,
                        next_retry_at = %next_retry_at,
                        "Delivery attempt failed, retry scheduled"
                    );
                } else {
                    WebhookDelivery::mark_failed(
                        &self.pool,
                        delivery.tenant_id,
                        delivery.id,
                        new_attempts,
                        &error,
                        status,
                    )
                    .await?;

                    tracing::error!(
                        target: "webhook_delivery",
                        delivery_id = %delivery.id,
                        endpoint_id = %endpoint.id,
                        attempts = new_attempts,
                        error = %error,
                        "Delivery failed permanently"
                    );
                }
            }
        }

        Ok(())
    }

    /// Probe an endpoint with a synthetic test event, synchronously.
    ///
    /// Reuses the real signing and HTTP path so the receiver sees exactly what
    /// production deliveries look like, but writes nothing to the ledger and
    /// therefore never enters the retry pipeline.
    pub async fn probe_endpoint(&self, endpoint: &WebhookEndpoint) -> ProbeResponse {
        let secret = match crypto::decrypt_secret(&endpoint.secret_encrypted, &self.encryption_key)
        {
            Ok(secret) => secret,
            Err(e) => {
                return ProbeResponse {
                    success: false,
                    http_status: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let probe_id = Uuid::new_v4();
        let payload = WebhookPayload {
            event_id: probe_id,
            event_type: PROBE_EVENT_TYPE.to_string(),
            timestamp: Utc::now(),
            tenant_id: endpoint.tenant_id,
            data: serde_json::json!({
                "message": "Test delivery from webhook configuration",
                "endpoint_id": endpoint.id,
            }),
        };

        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                return ProbeResponse {
                    success: false,
                    http_status: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let outcome = self
            .post_signed(
                &endpoint.url,
                &endpoint.custom_headers,
                endpoint.timeout_secs,
                &secret,
                PROBE_EVENT_TYPE,
                probe_id,
                &body,
            )
            .await;

        match outcome {
            AttemptOutcome::Success { status } => ProbeResponse {
                success: true,
                http_status: Some(status as u16),
                error: None,
            },
            AttemptOutcome::Failure { status, error } => ProbeResponse {
                success: false,
                http_status: status.map(|s| s as u16),
                error: Some(error),
            },
        }
    }

    /// Sign and POST one payload. Shared by real deliveries and probes.
    #[allow(clippy::too_many_arguments)]
    async fn post_signed(
        &self,
        url: &str,
        custom_headers: &serde_json::Value,
        timeout_secs: i32,
        secret: &str,
        event_type: &str,
        delivery_id: Uuid,
        body: &str,
    ) -> AttemptOutcome {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = crypto::compute_hmac_signature(secret, &timestamp, body.as_bytes());

        let mut request = self
            .http_client
            .post(url)
            .timeout(StdDuration::from_secs(timeout_secs.max(1) as u64))
            .header("Content-Type", "application/json")
            .header("X-Webhook-Timestamp", &timestamp)
            .header("X-Webhook-Signature", format!("sha256={signature}"))
            .header("X-Webhook-Event", event_type)
            .header("X-Delivery-Id", delivery_id.to_string());

        if let Some(headers) = custom_headers.as_object() {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }

        match request.body(body.to_string()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    AttemptOutcome::Success {
                        status: status.as_u16() as i16,
                    }
                } else {
                    AttemptOutcome::Failure {
                        status: Some(status.as_u16() as i16),
                        error: format!("HTTP {}", status.as_u16()),
                    }
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("Request timed out after {timeout_secs}s")
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request failed: {e}")
                };
                AttemptOutcome::Failure {
                    status: None,
                    error,
                }
            }
        }
    }
}

/// Outcome of one HTTP attempt.
enum AttemptOutcome {
    Success { status: i16 },
    Failure { status: Option<i16>, error: String },
}

/// Whether a record that has now performed `attempts` attempts still has
/// budget for another. An endpoint with `max_retries` N allows N + 1 total
/// attempts: the initial one plus N retries.
#[must_use]
pub fn attempts_remaining(attempts: i32, max_retries: i32) -> bool {
    attempts < max_retries + 1
}

/// Deterministic part of the backoff schedule: delay before the retry that
/// will be attempt `attempt + 1`, given `attempt` attempts already performed.
///
/// 60s, 120s, 240s, ... doubling up to a 2-hour cap.
#[must_use]
pub fn retry_delay_secs(attempts: i32) -> i64 {
    let exponent = (attempts - 1).clamp(0, 30) as u32;
    RETRY_BASE_SECS
        .saturating_mul(1i64 << exponent)
        .min(RETRY_CAP_SECS)
}

/// Next retry time for a record that has now performed `attempts` attempts:
/// the deterministic delay plus uniform jitter to spread thundering herds.
#[must_use]
pub fn calculate_next_retry_at(attempts: i32) -> DateTime<Utc> {
    let jitter = rand::thread_rng().gen_range(0..=RETRY_JITTER_SECS);
    Utc::now() + Duration::seconds(retry_delay_secs(attempts) + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_allows_max_retries_plus_one_attempts() {
        for max_retries in 0..=10 {
            let mut attempts = 0;
            loop {
                attempts += 1;
                if !attempts_remaining(attempts, max_retries) {
                    break;
                }
            }
            assert_eq!(attempts, max_retries + 1);
        }
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        assert!(!attempts_remaining(1, 0));
    }

    #[test]
    fn test_backoff_first_retry() {
        assert_eq!(retry_delay_secs(1), 60);
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(retry_delay_secs(2), 120);
        assert_eq!(retry_delay_secs(3), 240);
        assert_eq!(retry_delay_secs(4), 480);
    }

    #[test]
    fn test_backoff_non_decreasing() {
        let mut prev = 0;
        for attempts in 1..=20 {
            let delay = retry_delay_secs(attempts);
            assert!(delay >= prev, "delay shrank at attempt {attempts}");
            prev = delay;
        }
    }

    #[test]
    fn test_backoff_capped() {
        assert_eq!(retry_delay_secs(8), RETRY_CAP_SECS);
        assert_eq!(retry_delay_secs(30), RETRY_CAP_SECS);
        assert_eq!(retry_delay_secs(100), RETRY_CAP_SECS);
    }

    #[test]
    fn test_backoff_handles_degenerate_attempts() {
        // attempts should always be >= 1 when scheduling, but a zero or
        // negative input must not panic or go negative.
        assert_eq!(retry_delay_secs(0), 60);
        assert_eq!(retry_delay_secs(-5), 60);
    }

    #[test]
    fn test_next_retry_is_in_the_future() {
        let next = calculate_next_retry_at(1);
        let delta = next - Utc::now();
        assert!(delta >= Duration::seconds(59));
        assert!(delta <= Duration::seconds(60 + RETRY_JITTER_SECS + 1));
    }
}
