//! Event catalog, wire payload, and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// ---------------------------------------------------------------------------
// Event type catalog
// ---------------------------------------------------------------------------

/// The globally known catalog of webhook event types.
///
/// Endpoint subscriptions must be a non-empty subset of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    LeadCreated,
    LeadUpdated,
    LeadConverted,
    LeadDeleted,
    QuotationCreated,
    QuotationUpdated,
    QuotationSent,
    QuotationAccepted,
    QuotationDeclined,
    InvoiceCreated,
    InvoiceUpdated,
    InvoiceSent,
    InvoicePaid,
    InvoiceOverdue,
    InvoiceCancelled,
}

impl WebhookEventType {
    /// All known event types.
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![
            Self::LeadCreated,
            Self::LeadUpdated,
            Self::LeadConverted,
            Self::LeadDeleted,
            Self::QuotationCreated,
            Self::QuotationUpdated,
            Self::QuotationSent,
            Self::QuotationAccepted,
            Self::QuotationDeclined,
            Self::InvoiceCreated,
            Self::InvoiceUpdated,
            Self::InvoiceSent,
            Self::InvoicePaid,
            Self::InvoiceOverdue,
            Self::InvoiceCancelled,
        ]
    }

    /// Wire identifier, e.g. `lead.created`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead.created",
            Self::LeadUpdated => "lead.updated",
            Self::LeadConverted => "lead.converted",
            Self::LeadDeleted => "lead.deleted",
            Self::QuotationCreated => "quotation.created",
            Self::QuotationUpdated => "quotation.updated",
            Self::QuotationSent => "quotation.sent",
            Self::QuotationAccepted => "quotation.accepted",
            Self::QuotationDeclined => "quotation.declined",
            Self::InvoiceCreated => "invoice.created",
            Self::InvoiceUpdated => "invoice.updated",
            Self::InvoiceSent => "invoice.sent",
            Self::InvoicePaid => "invoice.paid",
            Self::InvoiceOverdue => "invoice.overdue",
            Self::InvoiceCancelled => "invoice.cancelled",
        }
    }

    /// Parse a wire identifier. Returns `None` for unknown types.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|et| et.as_str() == s)
    }

    /// Entity category (`lead`, `quotation`, `invoice`).
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::LeadCreated | Self::LeadUpdated | Self::LeadConverted | Self::LeadDeleted => {
                "lead"
            }
            Self::QuotationCreated
            | Self::QuotationUpdated
            | Self::QuotationSent
            | Self::QuotationAccepted
            | Self::QuotationDeclined => "quotation",
            Self::InvoiceCreated
            | Self::InvoiceUpdated
            | Self::InvoiceSent
            | Self::InvoicePaid
            | Self::InvoiceOverdue
            | Self::InvoiceCancelled => "invoice",
        }
    }

    /// Human-readable description for config UIs.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::LeadCreated => "A lead was created",
            Self::LeadUpdated => "A lead was updated",
            Self::LeadConverted => "A lead was converted to a customer",
            Self::LeadDeleted => "A lead was deleted",
            Self::QuotationCreated => "A quotation was created",
            Self::QuotationUpdated => "A quotation was updated",
            Self::QuotationSent => "A quotation was sent to the customer",
            Self::QuotationAccepted => "A quotation was accepted",
            Self::QuotationDeclined => "A quotation was declined",
            Self::InvoiceCreated => "An invoice was created",
            Self::InvoiceUpdated => "An invoice was updated",
            Self::InvoiceSent => "An invoice was sent to the customer",
            Self::InvoicePaid => "An invoice was paid",
            Self::InvoiceOverdue => "An invoice passed its due date unpaid",
            Self::InvoiceCancelled => "An invoice was cancelled",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire payload
// ---------------------------------------------------------------------------

/// JSON body POSTed to endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: Uuid,
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Ambient tenant identity
// ---------------------------------------------------------------------------

/// Tenant identity injected by the host application's auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

// ---------------------------------------------------------------------------
// Endpoint API types
// ---------------------------------------------------------------------------

/// Request body for registering an endpoint.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWebhookEndpointRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    pub event_types: Vec<String>,
    /// Extra headers sent with every delivery.
    #[serde(default)]
    pub custom_headers: Option<serde_json::Value>,
    /// Per-attempt HTTP timeout in seconds (5-120, default 30).
    pub timeout_secs: Option<i32>,
    /// Automatic retries after the initial attempt (0-10, default 5).
    pub max_retries: Option<i32>,
}

/// Request body for updating an endpoint. Absent fields are unchanged.
///
/// There is no secret field: the secret only changes via rotation.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWebhookEndpointRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub url: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub custom_headers: Option<serde_json::Value>,
    pub timeout_secs: Option<i32>,
    pub max_retries: Option<i32>,
    pub is_active: Option<bool>,
}

/// Endpoint representation returned by the API. Never carries the secret.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub event_types: Vec<String>,
    pub custom_headers: serde_json::Value,
    pub timeout_secs: i32,
    pub max_retries: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation response: the endpoint plus the one-time secret reveal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedWebhookEndpointResponse {
    #[serde(flatten)]
    pub endpoint: WebhookEndpointResponse,
    /// The signing secret in plaintext. Shown exactly once; it cannot be
    /// retrieved again, only rotated.
    pub secret: String,
}

/// Rotation response: the new secret, shown exactly once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RotatedSecretResponse {
    pub secret: String,
}

/// Query parameters for listing endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListEndpointsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub is_active: Option<bool>,
}

/// Paginated endpoint list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookEndpointListResponse {
    pub items: Vec<WebhookEndpointResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Delivery API types
// ---------------------------------------------------------------------------

/// Query parameters for listing deliveries.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListDeliveriesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Filter by status (`pending`, `retrying`, `sent`, `failed`).
    pub status: Option<String>,
}

/// Delivery record representation returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryResponse {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub status: String,
    pub attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub response_code: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub last_attempted_at: Option<DateTime<Utc>>,
}

/// Detailed delivery view, including the payload snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryDetailResponse {
    #[serde(flatten)]
    pub delivery: WebhookDeliveryResponse,
    pub payload: serde_json::Value,
}

/// Paginated delivery list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookDeliveryListResponse {
    pub items: Vec<WebhookDeliveryResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response from the operator bulk retry action.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RetryFailedResponse {
    /// Number of `failed` deliveries requeued.
    pub requeued: u64,
}

// ---------------------------------------------------------------------------
// Stats / probe API types
// ---------------------------------------------------------------------------

/// Query parameters for delivery statistics.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct StatsQuery {
    /// Restrict to deliveries created within the last N hours.
    pub window_hours: Option<i64>,
}

/// Per-endpoint delivery statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryStatsResponse {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    /// sent / (sent + failed); 1.0 when no terminal deliveries exist yet.
    pub success_rate: f64,
    /// Display-only health classification.
    pub health: String,
}

/// Result of the synchronous endpoint probe.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProbeResponse {
    pub success: bool,
    pub http_status: Option<u16>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Event type listing
// ---------------------------------------------------------------------------

/// One entry in the event type catalog listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeInfo {
    pub event_type: String,
    pub category: String,
    pub description: String,
}

/// Catalog listing response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeListResponse {
    pub event_types: Vec<EventTypeInfo>,
}

fn default_limit() -> i64 {
    50
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
