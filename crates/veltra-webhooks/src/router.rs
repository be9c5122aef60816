//! Axum router setup for the webhook API.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::handlers::{deliveries, endpoints};
use crate::services::delivery_service::DeliveryService;
use crate::services::endpoint_service::EndpointService;
use crate::services::stats_service::StatsService;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    pub endpoint_service: Arc<EndpointService>,
    pub delivery_service: Arc<DeliveryService>,
    pub stats_service: Arc<StatsService>,
    pool: PgPool,
}

impl WebhooksState {
    /// Create a new webhooks state.
    ///
    /// `encryption_key` must be 32 bytes; it guards endpoint secrets at rest.
    pub fn new(pool: PgPool, encryption_key: Vec<u8>) -> Self {
        Self {
            endpoint_service: Arc::new(EndpointService::new(
                pool.clone(),
                encryption_key.clone(),
            )),
            delivery_service: Arc::new(DeliveryService::new(pool.clone(), encryption_key)),
            stats_service: Arc::new(StatsService::new(pool.clone())),
            pool,
        }
    }

    /// Get a reference to the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates the webhook router with all routes.
pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        // Endpoint CRUD
        .route(
            "/webhooks/endpoints",
            post(endpoints::create_endpoint_handler).get(endpoints::list_endpoints_handler),
        )
        .route(
            "/webhooks/endpoints/{id}",
            get(endpoints::get_endpoint_handler)
                .patch(endpoints::update_endpoint_handler)
                .delete(endpoints::delete_endpoint_handler),
        )
        // Secret rotation and probe
        .route(
            "/webhooks/endpoints/{id}/rotate-secret",
            post(endpoints::rotate_secret_handler),
        )
        .route(
            "/webhooks/endpoints/{id}/test",
            post(endpoints::test_endpoint_handler),
        )
        // Statistics
        .route(
            "/webhooks/endpoints/{id}/stats",
            get(endpoints::endpoint_stats_handler),
        )
        // Event types
        .route(
            "/webhooks/event-types",
            get(endpoints::list_event_types_handler),
        )
        // Delivery history and operator retry
        .route(
            "/webhooks/endpoints/{id}/deliveries",
            get(deliveries::list_deliveries_handler),
        )
        .route(
            "/webhooks/endpoints/{id}/deliveries/{delivery_id}",
            get(deliveries::get_delivery_handler),
        )
        .route(
            "/webhooks/endpoints/{id}/retry-failed",
            post(deliveries::retry_failed_handler),
        )
        .with_state(state)
}
