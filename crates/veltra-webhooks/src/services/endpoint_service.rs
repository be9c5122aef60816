//! Webhook endpoint registry service.
//!
//! Business logic for registering, listing, updating and deleting webhook
//! endpoints, with URL/SSRF validation, event-type catalog checks, bounds
//! checks, secret generation + encryption at rest, and one-time-reveal secret
//! rotation.

use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto;
use crate::error::WebhookError;
use crate::models::{
    CreateWebhookEndpointRequest, CreatedWebhookEndpointResponse, ListEndpointsQuery,
    UpdateWebhookEndpointRequest, WebhookEndpointListResponse, WebhookEndpointResponse,
};
use crate::validation;
use veltra_db::models::{CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint};

/// Default maximum endpoints per tenant.
pub const DEFAULT_MAX_ENDPOINTS: i64 = 25;

/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: i32 = 30;

/// Default automatic retry budget.
pub const DEFAULT_MAX_RETRIES: i32 = 5;

/// Service for webhook endpoint registry operations.
#[derive(Clone)]
pub struct EndpointService {
    pool: PgPool,
    encryption_key: Vec<u8>,
    max_endpoints: i64,
    allow_http: bool,
}

impl EndpointService {
    /// Create a new endpoint registry service.
    #[must_use]
    pub fn new(pool: PgPool, encryption_key: Vec<u8>) -> Self {
        Self {
            pool,
            encryption_key,
            max_endpoints: DEFAULT_MAX_ENDPOINTS,
            allow_http: false,
        }
    }

    /// Set the maximum endpoints per tenant.
    #[must_use]
    pub fn with_max_endpoints(mut self, max: i64) -> Self {
        self.max_endpoints = max;
        self
    }

    /// Allow HTTP URLs (for development/testing).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Register a new endpoint.
    ///
    /// Generates the signing secret and returns its plaintext exactly once;
    /// only the encrypted form is persisted.
    pub async fn create_endpoint(
        &self,
        tenant_id: Uuid,
        request: CreateWebhookEndpointRequest,
    ) -> Result<CreatedWebhookEndpointResponse, WebhookError> {
        validation::validate_webhook_url(&request.url, self.allow_http)?;
        validation::validate_event_types(&request.event_types)?;

        let timeout_secs = request.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        validation::validate_timeout_secs(timeout_secs)?;

        let max_retries = request.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        validation::validate_max_retries(max_retries)?;

        let custom_headers = request
            .custom_headers
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        validation::validate_custom_headers(&custom_headers)?;

        let count = WebhookEndpoint::count_by_tenant(&self.pool, tenant_id, None).await?;
        if count >= self.max_endpoints {
            return Err(WebhookError::EndpointLimitExceeded {
                limit: self.max_endpoints,
            });
        }

        let secret = crypto::generate_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let endpoint = WebhookEndpoint::create(
            &self.pool,
            CreateWebhookEndpoint {
                tenant_id,
                name: request.name,
                description: request.description,
                url: request.url,
                secret_encrypted,
                event_types: request.event_types,
                custom_headers,
                timeout_secs,
                max_retries,
            },
        )
        .await?;

        tracing::info!(
            target: "webhook_registry",
            endpoint_id = %endpoint.id,
            tenant_id = %tenant_id,
            url = %endpoint.url,
            "Webhook endpoint registered"
        );

        Ok(CreatedWebhookEndpointResponse {
            endpoint: endpoint_to_response(endpoint),
            secret,
        })
    }

    /// List endpoints for a tenant with pagination.
    pub async fn list_endpoints(
        &self,
        tenant_id: Uuid,
        query: ListEndpointsQuery,
    ) -> Result<WebhookEndpointListResponse, WebhookError> {
        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let endpoints =
            WebhookEndpoint::list_by_tenant(&self.pool, tenant_id, limit, offset, query.is_active)
                .await?;
        let total = WebhookEndpoint::count_by_tenant(&self.pool, tenant_id, query.is_active).await?;

        Ok(WebhookEndpointListResponse {
            items: endpoints.into_iter().map(endpoint_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get a single endpoint.
    pub async fn get_endpoint(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        let endpoint = WebhookEndpoint::find_by_id(&self.pool, tenant_id, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Update endpoint configuration.
    ///
    /// The secret is never touched here; rotation is a distinct operation.
    /// Deactivation only prevents new deliveries from being created; queued
    /// records are untouched.
    pub async fn update_endpoint(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        request: UpdateWebhookEndpointRequest,
    ) -> Result<WebhookEndpointResponse, WebhookError> {
        if let Some(ref url) = request.url {
            validation::validate_webhook_url(url, self.allow_http)?;
        }
        if let Some(ref event_types) = request.event_types {
            validation::validate_event_types(event_types)?;
        }
        if let Some(timeout_secs) = request.timeout_secs {
            validation::validate_timeout_secs(timeout_secs)?;
        }
        if let Some(max_retries) = request.max_retries {
            validation::validate_max_retries(max_retries)?;
        }
        if let Some(ref headers) = request.custom_headers {
            validation::validate_custom_headers(headers)?;
        }

        let input = UpdateWebhookEndpoint {
            name: request.name,
            description: request.description,
            url: request.url,
            event_types: request.event_types,
            custom_headers: request.custom_headers,
            timeout_secs: request.timeout_secs,
            max_retries: request.max_retries,
            is_active: request.is_active,
        };

        let endpoint = WebhookEndpoint::update(&self.pool, tenant_id, id, input)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Rotate the endpoint's signing secret.
    ///
    /// Generates a new high-entropy secret, persists it, and returns the
    /// plaintext exactly once. Because the signer re-reads the endpoint on
    /// every attempt, the new secret takes effect on the very next delivery.
    pub async fn rotate_secret(&self, tenant_id: Uuid, id: Uuid) -> Result<String, WebhookError> {
        let secret = crypto::generate_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.encryption_key)?;

        let updated =
            WebhookEndpoint::update_secret(&self.pool, tenant_id, id, &secret_encrypted).await?;
        if !updated {
            return Err(WebhookError::EndpointNotFound);
        }

        tracing::info!(
            target: "webhook_registry",
            endpoint_id = %id,
            tenant_id = %tenant_id,
            "Webhook endpoint secret rotated"
        );

        Ok(secret)
    }

    /// Delete an endpoint. Cascades to its delivery records.
    pub async fn delete_endpoint(&self, tenant_id: Uuid, id: Uuid) -> Result<(), WebhookError> {
        let deleted = WebhookEndpoint::delete(&self.pool, tenant_id, id).await?;
        if !deleted {
            return Err(WebhookError::EndpointNotFound);
        }

        tracing::info!(
            target: "webhook_registry",
            endpoint_id = %id,
            tenant_id = %tenant_id,
            "Webhook endpoint deleted"
        );

        Ok(())
    }
}

/// Convert a DB model to an API response. The secret never leaves the model.
fn endpoint_to_response(endpoint: WebhookEndpoint) -> WebhookEndpointResponse {
    WebhookEndpointResponse {
        id: endpoint.id,
        tenant_id: endpoint.tenant_id,
        name: endpoint.name,
        description: endpoint.description,
        url: endpoint.url,
        event_types: endpoint.event_types,
        custom_headers: endpoint.custom_headers,
        timeout_secs: endpoint.timeout_secs,
        max_retries: endpoint.max_retries,
        is_active: endpoint.is_active,
        created_at: endpoint.created_at,
        updated_at: endpoint.updated_at,
    }
}
