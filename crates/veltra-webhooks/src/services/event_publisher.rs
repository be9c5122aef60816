//! Event publishing: the single entry point the rest of the application uses
//! to hand lifecycle events to the webhook subsystem.
//!
//! Emission is fire-and-forget over a tokio broadcast channel; a slow or
//! unreachable receiver can never fail or block the domain operation that
//! produced an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::WebhookEventType;

/// A domain event handed to the webhook subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub tenant_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Opaque payload snapshot owned by the originating domain entity.
    pub data: serde_json::Value,
}

/// Publisher that sends webhook events to the delivery worker.
#[derive(Clone)]
pub struct EventPublisher {
    sender: tokio::sync::broadcast::Sender<WebhookEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the given channel capacity.
    ///
    /// `capacity` bounds how far the delivery worker may fall behind before
    /// events are lost: a receiver that lags by more than `capacity` events
    /// permanently drops the overwritten ones, and no delivery records are
    /// ever created for them. Size it for the burstiest expected emit rate
    /// multiplied by the worst-case worker stall.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<WebhookEvent>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Emit a lifecycle event. Fire-and-forget; errors are logged, never
    /// propagated to the caller.
    pub fn emit(&self, event_type: WebhookEventType, data: serde_json::Value, tenant_id: Uuid) {
        self.publish(WebhookEvent {
            event_id: Uuid::new_v4(),
            event_type: event_type.as_str().to_string(),
            tenant_id,
            timestamp: Utc::now(),
            data,
        });
    }

    /// Publish a fully-formed event to all subscribers.
    pub fn publish(&self, event: WebhookEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(
                target: "webhook_delivery",
                error = %e,
                "No active webhook worker to receive event"
            );
        }
    }

    /// Get a new receiver for the broadcast channel.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WebhookEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let (publisher, mut receiver) = EventPublisher::new(16);
        let tenant_id = Uuid::new_v4();

        publisher.emit(
            WebhookEventType::InvoicePaid,
            json!({"invoice_id": "INV-1001"}),
            tenant_id,
        );

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type, "invoice.paid");
        assert_eq!(event.tenant_id, tenant_id);
        assert_eq!(event.data["invoice_id"], "INV-1001");
    }

    #[tokio::test]
    async fn test_emit_without_subscriber_does_not_panic() {
        let (publisher, receiver) = EventPublisher::new(16);
        drop(receiver);

        // Must not error or block the emitting domain operation.
        publisher.emit(WebhookEventType::LeadCreated, json!({}), Uuid::new_v4());
    }
}
