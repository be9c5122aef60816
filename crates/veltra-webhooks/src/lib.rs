//! Outbound webhook delivery for lead, quotation and invoice lifecycle events.
//!
//! Provides tenant-scoped endpoint registration with secret rotation, async
//! delivery with HMAC-SHA256 signing, exponential backoff retries over a
//! durable delivery ledger, and per-endpoint health statistics.

pub mod crypto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod validation;
pub mod worker;

pub use error::WebhookError;
pub use models::WebhookEventType;
pub use router::{webhooks_router, WebhooksState};
pub use services::event_publisher::{EventPublisher, WebhookEvent};
pub use worker::{WebhookWorker, WorkerConfig, WorkerHandle};
