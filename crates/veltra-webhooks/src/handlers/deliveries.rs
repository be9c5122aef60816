//! Delivery history and operator-retry handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    ListDeliveriesQuery, RetryFailedResponse, TenantContext, WebhookDeliveryDetailResponse,
    WebhookDeliveryListResponse, WebhookDeliveryResponse,
};
use crate::router::WebhooksState;
use veltra_db::models::{DeliveryStatus, WebhookDelivery, WebhookEndpoint};

fn delivery_to_response(delivery: &WebhookDelivery) -> WebhookDeliveryResponse {
    WebhookDeliveryResponse {
        id: delivery.id,
        endpoint_id: delivery.endpoint_id,
        event_id: delivery.event_id,
        event_type: delivery.event_type.clone(),
        status: delivery.status.clone(),
        attempts: delivery.attempts,
        next_retry_at: delivery.next_retry_at,
        last_error: delivery.last_error.clone(),
        response_code: delivery.response_code,
        created_at: delivery.created_at,
        last_attempted_at: delivery.last_attempted_at,
    }
}

async fn require_endpoint(
    state: &WebhooksState,
    tenant_id: Uuid,
    endpoint_id: Uuid,
) -> Result<WebhookEndpoint, WebhookError> {
    WebhookEndpoint::find_by_id(state.pool(), tenant_id, endpoint_id)
        .await
        .map_err(WebhookError::Database)?
        .ok_or(WebhookError::EndpointNotFound)
}

/// List delivery records for an endpoint, newest first.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}/deliveries",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID"),
        ListDeliveriesQuery,
    ),
    responses(
        (status = 200, description = "Paginated delivery list", body = WebhookDeliveryListResponse),
        (status = 400, description = "Invalid status filter"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_deliveries_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<WebhookDeliveryListResponse>> {
    require_endpoint(&state, tenant.tenant_id, id).await?;

    if let Some(ref status) = query.status {
        if DeliveryStatus::parse(status).is_none() {
            return Err(WebhookError::Validation(format!(
                "Unknown delivery status: {status}"
            )));
        }
    }

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);
    let status = query.status.as_deref();

    let deliveries = WebhookDelivery::list_by_endpoint(
        state.pool(),
        tenant.tenant_id,
        id,
        limit,
        offset,
        status,
    )
    .await
    .map_err(WebhookError::Database)?;

    let total = WebhookDelivery::count_by_endpoint(state.pool(), tenant.tenant_id, id, status)
        .await
        .map_err(WebhookError::Database)?;

    Ok(Json(WebhookDeliveryListResponse {
        items: deliveries.iter().map(delivery_to_response).collect(),
        total,
        limit,
        offset,
    }))
}

/// Get one delivery record, including its payload snapshot.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}/deliveries/{delivery_id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID"),
        ("delivery_id" = Uuid, Path, description = "Delivery ID"),
    ),
    responses(
        (status = 200, description = "Delivery details", body = WebhookDeliveryDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint or delivery not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_delivery_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, delivery_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<WebhookDeliveryDetailResponse>> {
    let delivery = WebhookDelivery::find_by_id(state.pool(), tenant.tenant_id, delivery_id)
        .await
        .map_err(WebhookError::Database)?
        .filter(|d| d.endpoint_id == id)
        .ok_or(WebhookError::DeliveryNotFound)?;

    Ok(Json(WebhookDeliveryDetailResponse {
        delivery: delivery_to_response(&delivery),
        payload: delivery.payload,
    }))
}

/// Requeue all permanently failed deliveries of an endpoint.
///
/// Each requeued record re-enters the retry pipeline with a fresh attempt
/// budget and is due immediately.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/retry-failed",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Number of deliveries requeued", body = RetryFailedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Endpoint not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn retry_failed_handler(
    State(state): State<WebhooksState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RetryFailedResponse>> {
    require_endpoint(&state, tenant.tenant_id, id).await?;

    let requeued = WebhookDelivery::retry_failed(state.pool(), tenant.tenant_id, id)
        .await
        .map_err(WebhookError::Database)?;

    tracing::info!(
        target: "webhook_delivery",
        endpoint_id = %id,
        tenant_id = %tenant.tenant_id,
        requeued = requeued,
        "Failed deliveries requeued by operator"
    );

    Ok(Json(RetryFailedResponse { requeued }))
}
