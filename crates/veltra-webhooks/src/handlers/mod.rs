//! HTTP handlers for the webhook API.

pub mod deliveries;
pub mod endpoints;
