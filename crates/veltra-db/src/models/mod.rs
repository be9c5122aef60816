//! Database models.

pub mod webhook_delivery;
pub mod webhook_endpoint;

pub use webhook_delivery::{
    CreateWebhookDelivery, DeliveryStatus, EndpointDeliveryStats, WebhookDelivery,
};
pub use webhook_endpoint::{CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint};
