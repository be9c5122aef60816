//! Webhook delivery ledger model.
//!
//! One record per (endpoint, event) pair. The payload is a snapshot captured
//! at dispatch time; a retry always replays exactly what was true when the
//! event fired. Workers claim records through a `claimed_until` lease so that
//! two workers never attempt the same delivery concurrently, while a crashed
//! worker's claim expires on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created by the dispatcher, not yet attempted.
    Pending,
    /// At least one attempt failed; scheduled for another.
    Retrying,
    /// Receiver acknowledged with 2xx. Terminal.
    Sent,
    /// Attempt budget exhausted. Terminal until an operator retry.
    Failed,
}

impl DeliveryStatus {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "retrying" => Some(Self::Retrying),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no further automatic attempts happen from this status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A delivery record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// Unique identifier, also sent to the receiver for dedup.
    pub id: Uuid,

    /// Owning tenant.
    pub tenant_id: Uuid,

    /// The endpoint this delivery targets.
    pub endpoint_id: Uuid,

    /// The domain event that produced this delivery.
    pub event_id: Uuid,

    /// Event type identifier.
    pub event_type: String,

    /// Immutable payload snapshot captured at dispatch time.
    pub payload: serde_json::Value,

    /// Current status (`pending`, `retrying`, `sent`, `failed`).
    pub status: String,

    /// Attempts performed so far. Never exceeds `max_retries + 1` while the
    /// record is non-terminal.
    pub attempts: i32,

    /// When the record next becomes due. NULL for terminal records.
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Exclusive worker lease; the record is reclaimable once this passes.
    pub claimed_until: Option<DateTime<Utc>>,

    /// Error message from the most recent failed attempt.
    pub last_error: Option<String>,

    /// HTTP response code of the most recent attempt.
    pub response_code: Option<i16>,

    /// When the dispatcher created the record.
    pub created_at: DateTime<Utc>,

    /// When the most recent attempt finished.
    pub last_attempted_at: Option<DateTime<Utc>>,
}

/// Input for creating a delivery record.
#[derive(Debug, Clone)]
pub struct CreateWebhookDelivery {
    pub tenant_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Aggregated delivery counters for one endpoint.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize)]
pub struct EndpointDeliveryStats {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
}

impl WebhookDelivery {
    /// Create a delivery record with status `pending`, due immediately.
    pub async fn create<'e, E>(executor: E, input: CreateWebhookDelivery) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            INSERT INTO webhook_deliveries (
                tenant_id, endpoint_id, event_id, event_type, payload,
                status, attempts, next_retry_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, now())
            RETURNING *
            ",
        )
        .bind(input.tenant_id)
        .bind(input.endpoint_id)
        .bind(input.event_id)
        .bind(&input.event_type)
        .bind(&input.payload)
        .fetch_one(executor)
        .await
    }

    /// Find a delivery by id within a tenant.
    pub async fn find_by_id<'e, E>(
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// List deliveries for an endpoint, newest first, optional status filter.
    pub async fn list_by_endpoint<'e, E>(
        executor: E,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        limit: i64,
        offset: i64,
        status: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE tenant_id = $1 AND endpoint_id = $2
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            ",
        )
        .bind(tenant_id)
        .bind(endpoint_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    /// Count deliveries for an endpoint with optional status filter.
    pub async fn count_by_endpoint<'e, E>(
        executor: E,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        status: Option<&str>,
    ) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhook_deliveries
            WHERE tenant_id = $1 AND endpoint_id = $2
              AND ($3::text IS NULL OR status = $3)
            ",
        )
        .bind(tenant_id)
        .bind(endpoint_id)
        .bind(status)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Re-assert an existing claim immediately before an attempt.
    ///
    /// `held_until` is the lease expiry the record carried when this worker
    /// claimed it; it acts as an ownership token. The update only succeeds
    /// while that exact lease is still on the record, so a worker whose lease
    /// expired and whose record was re-claimed by another scan gets `None`
    /// and must drop the attempt instead of double-posting it.
    pub async fn extend_claim<'e, E>(
        executor: E,
        id: Uuid,
        held_until: Option<DateTime<Utc>>,
        lease_secs: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET claimed_until = now() + make_interval(secs => $3)
            WHERE id = $1
              AND claimed_until = $2
              AND status IN ('pending', 'retrying')
            RETURNING *
            ",
        )
        .bind(id)
        .bind(held_until)
        .bind(lease_secs as f64)
        .fetch_optional(executor)
        .await
    }

    /// Claim a batch of due deliveries for active endpoints.
    ///
    /// This is the retry driver's scan: records whose `next_retry_at` has
    /// elapsed, whose lease is absent or expired, and whose endpoint is still
    /// active. `FOR UPDATE SKIP LOCKED` keeps concurrent scanners from
    /// double-claiming.
    pub async fn claim_due<'e, E>(
        executor: E,
        batch_size: i64,
        lease_secs: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            UPDATE webhook_deliveries
            SET claimed_until = now() + make_interval(secs => $2)
            WHERE id IN (
                SELECT d.id FROM webhook_deliveries d
                JOIN webhook_endpoints e ON e.id = d.endpoint_id
                WHERE d.status IN ('pending', 'retrying')
                  AND d.next_retry_at <= now()
                  AND (d.claimed_until IS NULL OR d.claimed_until < now())
                  AND e.is_active
                ORDER BY d.next_retry_at
                LIMIT $1
                FOR UPDATE OF d SKIP LOCKED
            )
            RETURNING *
            ",
        )
        .bind(batch_size)
        .bind(lease_secs as f64)
        .fetch_all(executor)
        .await
    }

    /// Release a claim without recording an attempt.
    ///
    /// Used when an attempt is aborted before any HTTP call is made (for
    /// example a secret decryption failure), so a local defect does not burn
    /// through the endpoint's retry budget.
    pub async fn release_claim<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r"
            UPDATE webhook_deliveries
            SET claimed_until = NULL
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Record a successful attempt: terminal `sent`.
    pub async fn mark_sent<'e, E>(
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        attempts: i32,
        response_code: i16,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r"
            UPDATE webhook_deliveries
            SET status = 'sent',
                attempts = $3,
                response_code = $4,
                next_retry_at = NULL,
                claimed_until = NULL,
                last_error = NULL,
                last_attempted_at = now()
            WHERE tenant_id = $1 AND id = $2
              AND status IN ('pending', 'retrying')
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(attempts)
        .bind(response_code)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Record a failed attempt with remaining budget: schedule the next one.
    pub async fn mark_retrying<'e, E>(
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        attempts: i32,
        last_error: &str,
        response_code: Option<i16>,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r"
            UPDATE webhook_deliveries
            SET status = 'retrying',
                attempts = $3,
                last_error = $4,
                response_code = $5,
                next_retry_at = $6,
                claimed_until = NULL,
                last_attempted_at = now()
            WHERE tenant_id = $1 AND id = $2
              AND status IN ('pending', 'retrying')
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(attempts)
        .bind(last_error)
        .bind(response_code)
        .bind(next_retry_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Record a failed attempt with the budget exhausted: terminal `failed`.
    pub async fn mark_failed<'e, E>(
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        attempts: i32,
        last_error: &str,
        response_code: Option<i16>,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r"
            UPDATE webhook_deliveries
            SET status = 'failed',
                attempts = $3,
                last_error = $4,
                response_code = $5,
                next_retry_at = NULL,
                claimed_until = NULL,
                last_attempted_at = now()
            WHERE tenant_id = $1 AND id = $2
              AND status IN ('pending', 'retrying')
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(attempts)
        .bind(last_error)
        .bind(response_code)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Operator bulk retry: re-enter all `failed` records of an endpoint into
    /// the pipeline with a fresh attempt budget. Returns the number requeued.
    ///
    /// This is the only transition out of `failed`.
    pub async fn retry_failed<'e, E>(
        executor: E,
        tenant_id: Uuid,
        endpoint_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let result = sqlx::query(
            r"
            UPDATE webhook_deliveries
            SET status = 'retrying',
                attempts = 0,
                next_retry_at = now(),
                claimed_until = NULL,
                last_error = NULL
            WHERE tenant_id = $1 AND endpoint_id = $2
              AND status = 'failed'
            ",
        )
        .bind(tenant_id)
        .bind(endpoint_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Aggregate delivery counters for an endpoint, optionally limited to
    /// records created after `since`.
    pub async fn stats_for_endpoint<'e, E>(
        executor: E,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<EndpointDeliveryStats, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'sent') AS sent,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status IN ('pending', 'retrying')) AS pending
            FROM webhook_deliveries
            WHERE tenant_id = $1 AND endpoint_id = $2
              AND ($3::timestamptz IS NULL OR created_at >= $3)
            ",
        )
        .bind(tenant_id)
        .bind(endpoint_id)
        .bind(since)
        .fetch_one(executor)
        .await
    }
}
