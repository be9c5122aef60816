//! Webhook business-logic services.

pub mod delivery_service;
pub mod endpoint_service;
pub mod event_publisher;
pub mod stats_service;
