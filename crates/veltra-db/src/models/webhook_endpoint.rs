//! Webhook endpoint registry model.
//!
//! An endpoint is a tenant-registered HTTPS receiver with a subscribed set of
//! event types, an encrypted signing secret, and a retry policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered webhook endpoint.
///
/// The secret is stored encrypted (AES-256-GCM, base64) and is never exposed
/// through this model beyond the encrypted form; only the registry and the
/// signer decrypt it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    /// Unique identifier.
    pub id: Uuid,

    /// Owning tenant.
    pub tenant_id: Uuid,

    /// Human-readable name.
    pub name: String,

    /// Free-text description.
    pub description: Option<String>,

    /// Target URL (HTTPS).
    pub url: String,

    /// Encrypted signing secret.
    pub secret_encrypted: String,

    /// Subscribed event types; non-empty subset of the catalog.
    pub event_types: Vec<String>,

    /// Extra request headers sent with every delivery (string -> string map).
    pub custom_headers: serde_json::Value,

    /// Per-attempt HTTP timeout in seconds (5-120).
    pub timeout_secs: i32,

    /// Maximum automatic retries after the initial attempt (0-10).
    pub max_retries: i32,

    /// Whether the dispatcher creates new deliveries for this endpoint.
    pub is_active: bool,

    /// When the endpoint was registered.
    pub created_at: DateTime<Utc>,

    /// When the configuration last changed.
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a new endpoint.
#[derive(Debug, Clone)]
pub struct CreateWebhookEndpoint {
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub secret_encrypted: String,
    pub event_types: Vec<String>,
    pub custom_headers: serde_json::Value,
    pub timeout_secs: i32,
    pub max_retries: i32,
}

/// Input for updating an endpoint. `None` fields are left unchanged.
///
/// The secret is deliberately absent; it only changes through
/// `WebhookEndpoint::update_secret` (rotation).
#[derive(Debug, Clone, Default)]
pub struct UpdateWebhookEndpoint {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub custom_headers: Option<serde_json::Value>,
    pub timeout_secs: Option<i32>,
    pub max_retries: Option<i32>,
    pub is_active: Option<bool>,
}

impl WebhookEndpoint {
    /// Register a new endpoint.
    pub async fn create<'e, E>(executor: E, input: CreateWebhookEndpoint) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            INSERT INTO webhook_endpoints (
                tenant_id, name, description, url, secret_encrypted,
                event_types, custom_headers, timeout_secs, max_retries
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            ",
        )
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.url)
        .bind(&input.secret_encrypted)
        .bind(&input.event_types)
        .bind(&input.custom_headers)
        .bind(input.timeout_secs)
        .bind(input.max_retries)
        .fetch_one(executor)
        .await
    }

    /// Find an endpoint by id within a tenant.
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
            SELECT * FROM webhook_endpoints
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// List endpoints for a tenant with pagination and optional active filter.
    pub async fn list_by_tenant<'e, E>(
        executor: E,
        tenant_id: Uuid,
        limit: i64,
        offset: i64,
        is_active: Option<bool>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_endpoints
            WHERE tenant_id = $1
              AND ($2::boolean IS NULL OR is_active = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(tenant_id)
        .bind(is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    /// Count endpoints for a tenant.
    pub async fn count_by_tenant<'e, E>(
        executor: E,
        tenant_id: Uuid,
        is_active: Option<bool>,
    ) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM webhook_endpoints
            WHERE tenant_id = $1
              AND ($2::boolean IS NULL OR is_active = $2)
            ",
        )
        .bind(tenant_id)
        .bind(is_active)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Find all active endpoints of a tenant subscribed to an event type.
    ///
    /// This is the dispatcher's resolution query; inactive endpoints never
    /// match regardless of their subscriptions.
    pub async fn find_active_by_event_type<'e, E>(
        executor: E,
        tenant_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            SELECT * FROM webhook_endpoints
            WHERE tenant_id = $1
              AND is_active
              AND $2 = ANY(event_types)
            ORDER BY created_at
            ",
        )
        .bind(tenant_id)
        .bind(event_type)
        .fetch_all(executor)
        .await
    }

    /// Update endpoint configuration. Returns `None` if the endpoint does not
    /// exist in the tenant.
    pub async fn update<'e, E>(
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateWebhookEndpoint,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as(
            r"
            UPDATE webhook_endpoints SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                url = COALESCE($5, url),
                event_types = COALESCE($6, event_types),
                custom_headers = COALESCE($7, custom_headers),
                timeout_secs = COALESCE($8, timeout_secs),
                max_retries = COALESCE($9, max_retries),
                is_active = COALESCE($10, is_active),
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.url)
        .bind(&input.event_types)
        .bind(&input.custom_headers)
        .bind(input.timeout_secs)
        .bind(input.max_retries)
        .bind(input.is_active)
        .fetch_optional(executor)
        .await
    }

    /// Replace the endpoint's encrypted secret (rotation).
    ///
    /// Returns false if the endpoint does not exist in the tenant.
    pub async fn update_secret<'e, E>(
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        secret_encrypted: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let result = sqlx::query(
            r"
            UPDATE webhook_endpoints
            SET secret_encrypted = $3, updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(secret_encrypted)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an endpoint. Cascades to its delivery records.
    pub async fn delete<'e, E>(executor: E, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let result = sqlx::query(
            r"
            DELETE FROM webhook_endpoints
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
