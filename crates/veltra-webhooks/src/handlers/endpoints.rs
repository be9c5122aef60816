//! CRUD, rotation and probe handlers for webhook endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    CreateWebhookEndpointRequest, CreatedWebhookEndpointResponse, EventTypeInfo,
    EventTypeListResponse, ListEndpointsQuery, ProbeResponse, RotatedSecretResponse, StatsQuery,
    TenantContext, UpdateWebhookEndpointRequest, WebhookEndpointListResponse,
    WebhookEndpointResponse, WebhookEventType,
};
use crate::router::WebhooksState;
use veltra_db::models::WebhookEndpoint;

/// Register a new webhook endpoint.
///
/// The response includes the signing secret in plaintext exactly once.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    request_body = CreateWebhookEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created, secret revealed once", body = CreatedWebhookEndpointResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Endpoint limit exceeded"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Json(request): Json<CreateWebhookEndpointRequest>,
) -> ApiResult<(StatusCode, Json<CreatedWebhookEndpointResponse>)> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .endpoint_service
        .create_endpoint(tenant.tenant_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List webhook endpoints.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    params(ListEndpointsQuery),
    responses(
        (status = 200, description = "Paginated endpoint list", body = WebhookEndpointListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_endpoints_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<ListEndpointsQuery>,
) -> ApiResult<Json<WebhookEndpointListResponse>> {
    let response = state
        .endpoint_service
        .list_endpoints(tenant.tenant_id, query)
        .await?;

    Ok(Json(response))
}

/// Get a single webhook endpoint.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Endpoint details", body = WebhookEndpointResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    let response = state
        .endpoint_service
        .get_endpoint(tenant.tenant_id, id)
        .await?;

    Ok(Json(response))
}

/// Update a webhook endpoint's configuration.
#[utoipa::path(
    patch,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    request_body = UpdateWebhookEndpointRequest,
    responses(
        (status = 200, description = "Updated endpoint", body = WebhookEndpointResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateWebhookEndpointRequest>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    request
        .validate()
        .map_err(|e| WebhookError::Validation(e.to_string()))?;

    let response = state
        .endpoint_service
        .update_endpoint(tenant.tenant_id, id, request)
        .await?;

    Ok(Json(response))
}

/// Delete a webhook endpoint and its delivery history.
#[utoipa::path(
    delete,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 204, description = "Endpoint deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .endpoint_service
        .delete_endpoint(tenant.tenant_id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Rotate an endpoint's signing secret.
///
/// The new secret is revealed exactly once. Signatures switch to it on the
/// very next delivery attempt.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/rotate-secret",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "New secret, revealed once", body = RotatedSecretResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rotate_secret_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RotatedSecretResponse>> {
    let secret = state
        .endpoint_service
        .rotate_secret(tenant.tenant_id, id)
        .await?;

    Ok(Json(RotatedSecretResponse { secret }))
}

/// Send a signed test event to an endpoint, synchronously.
///
/// The probe does not touch the delivery ledger and is never retried.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/test",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Probe result", body = ProbeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn test_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProbeResponse>> {
    let endpoint = WebhookEndpoint::find_by_id(state.pool(), tenant.tenant_id, id)
        .await
        .map_err(WebhookError::Database)?
        .ok_or(WebhookError::EndpointNotFound)?;

    let response = state.delivery_service.probe_endpoint(&endpoint).await;

    Ok(Json(response))
}

/// Delivery statistics and health for an endpoint.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}/stats",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID"),
        StatsQuery,
    ),
    responses(
        (status = 200, description = "Delivery statistics", body = crate::models::DeliveryStatsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn endpoint_stats_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<crate::models::DeliveryStatsResponse>> {
    let response = state
        .stats_service
        .get_stats(tenant.tenant_id, id, query)
        .await?;

    Ok(Json(response))
}

/// List the webhook event type catalog.
#[utoipa::path(
    get,
    path = "/webhooks/event-types",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Known event types", body = EventTypeListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_event_types_handler() -> Json<EventTypeListResponse> {
    let event_types = WebhookEventType::all()
        .into_iter()
        .map(|et| EventTypeInfo {
            event_type: et.as_str().to_string(),
            category: et.category().to_string(),
            description: et.description().to_string(),
        })
        .collect();

    Json(EventTypeListResponse { event_types })
}
