//! Per-endpoint delivery statistics and health classification.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::WebhookError;
use crate::models::{DeliveryStatsResponse, StatsQuery};
use veltra_db::models::{WebhookDelivery, WebhookEndpoint};

/// Display-only health band derived from the success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthBand {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl HealthBand {
    /// Classify a success rate (0.0 to 1.0).
    #[must_use]
    pub fn classify(success_rate: f64) -> Self {
        if success_rate >= 0.95 {
            Self::Excellent
        } else if success_rate >= 0.80 {
            Self::Good
        } else if success_rate >= 0.60 {
            Self::Warning
        } else {
            Self::Critical
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Service aggregating delivery outcomes per endpoint.
#[derive(Clone)]
pub struct StatsService {
    pool: PgPool,
}

impl StatsService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delivery statistics for one endpoint, optionally over a trailing
    /// window.
    ///
    /// The success rate only considers terminal records; in-flight deliveries
    /// are reported but do not drag the rate down. With no terminal records
    /// yet the rate defaults to 1.0, so a freshly registered endpoint reads as
    /// healthy rather than broken.
    pub async fn get_stats(
        &self,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        query: StatsQuery,
    ) -> Result<DeliveryStatsResponse, WebhookError> {
        let endpoint = WebhookEndpoint::find_by_id(&self.pool, tenant_id, endpoint_id).await?;
        if endpoint.is_none() {
            return Err(WebhookError::EndpointNotFound);
        }

        let since = query
            .window_hours
            .map(|hours| Utc::now() - Duration::hours(hours.max(1)));

        let stats =
            WebhookDelivery::stats_for_endpoint(&self.pool, tenant_id, endpoint_id, since).await?;

        let terminal = stats.sent + stats.failed;
        let success_rate = if terminal == 0 {
            1.0
        } else {
            stats.sent as f64 / terminal as f64
        };

        Ok(DeliveryStatsResponse {
            total: stats.total,
            sent: stats.sent,
            failed: stats.failed,
            pending: stats.pending,
            success_rate,
            health: HealthBand::classify(success_rate).as_str().to_string(),
        })
    }
}
