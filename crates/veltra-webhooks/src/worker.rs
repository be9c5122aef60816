//! Background webhook worker.
//!
//! One task owns the whole delivery pipeline: it consumes published domain
//! events and fans them out into delivery records, and it periodically scans
//! the ledger for due records (fresh and retrying alike), claiming each under
//! a lease before handing it to a bounded pool of attempt tasks. Claims make
//! processing exclusive across workers; leases make it crash-safe, since an
//! expired lease simply surfaces the record on a later scan.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{broadcast, watch, Semaphore};

use crate::services::delivery_service::DeliveryService;
use crate::services::event_publisher::WebhookEvent;
use veltra_db::models::WebhookDelivery;

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum delivery attempts in flight at once.
    pub concurrency: usize,
    /// How often to scan the ledger for due deliveries.
    pub scan_interval: Duration,
    /// Claim lease duration in seconds. Each scan claims no more records than
    /// it has free attempt slots, so a claimed record starts its attempt
    /// immediately; the lease therefore only has to outlive one attempt, the
    /// largest endpoint timeout plus margin.
    pub claim_lease_secs: i64,
    /// Maximum records claimed per scan.
    pub batch_size: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            scan_interval: Duration::from_secs(5),
            claim_lease_secs: 180,
            batch_size: 50,
        }
    }
}

/// The background delivery worker.
pub struct WebhookWorker {
    pool: PgPool,
    delivery_service: DeliveryService,
    config: WorkerConfig,
}

/// Handle for stopping a running worker.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for in-flight attempts to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

impl WebhookWorker {
    #[must_use]
    pub fn new(pool: PgPool, delivery_service: DeliveryService, config: WorkerConfig) -> Self {
        Self {
            pool,
            delivery_service,
            config,
        }
    }

    /// Spawn the worker loop, consuming events from `events`.
    #[must_use]
    pub fn start(self, events: broadcast::Receiver<WebhookEvent>) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(events, shutdown_rx));

        WorkerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }

    async fn run(
        self,
        mut events: broadcast::Receiver<WebhookEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut scan_tick = tokio::time::interval(self.config.scan_interval);
        scan_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut events_closed = false;

        tracing::info!(
            target: "webhook_worker",
            concurrency = self.config.concurrency,
            scan_interval_secs = self.config.scan_interval.as_secs(),
            "Webhook worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv(), if !events_closed => {
                    match event {
                        Ok(event) => {
                            if let Err(e) = self.delivery_service.dispatch_event(&event).await {
                                tracing::error!(
                                    target: "webhook_worker",
                                    event_id = %event.event_id,
                                    error = %e,
                                    "Event dispatch failed"
                                );
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                target: "webhook_worker",
                                skipped = skipped,
                                "Worker lagged behind event stream, events dropped"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events_closed = true;
                        }
                    }
                }
                _ = scan_tick.tick() => {
                    self.scan_due(&semaphore).await;
                }
            }
        }

        // Drain: acquiring every permit means no attempt task is running.
        let _ = semaphore
            .acquire_many(self.config.concurrency as u32)
            .await;

        tracing::info!(target: "webhook_worker", "Webhook worker stopped");
    }

    /// Claim a batch of due deliveries and process each on the bounded pool.
    ///
    /// The batch is capped at the attempt slots currently free, so no claimed
    /// record ever queues behind other attempts while its lease runs down.
    /// Each attempt task still re-asserts the claim right before posting, so
    /// a record whose lease expired anyway (worker stall, clock trouble) is
    /// dropped here rather than posted twice.
    async fn scan_due(&self, semaphore: &Arc<Semaphore>) {
        let slots = semaphore
            .available_permits()
            .min(self.config.batch_size as usize);
        if slots == 0 {
            return;
        }

        let due = match WebhookDelivery::claim_due(
            &self.pool,
            slots as i64,
            self.config.claim_lease_secs,
        )
        .await
        {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(
                    target: "webhook_worker",
                    error = %e,
                    "Due-delivery scan failed"
                );
                return;
            }
        };

        if due.is_empty() {
            return;
        }

        tracing::debug!(
            target: "webhook_worker",
            claimed = due.len(),
            "Claimed due deliveries"
        );

        for delivery in due {
            // Cannot block: the batch was sized by available_permits and this
            // loop is the only permit taker.
            let permit = match Arc::clone(semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let service = self.delivery_service.clone();
            let pool = self.pool.clone();
            let lease_secs = self.config.claim_lease_secs;

            tokio::spawn(async move {
                let _permit = permit;

                let reasserted = WebhookDelivery::extend_claim(
                    &pool,
                    delivery.id,
                    delivery.claimed_until,
                    lease_secs,
                )
                .await;

                let delivery = match reasserted {
                    Ok(Some(delivery)) => delivery,
                    Ok(None) => {
                        tracing::debug!(
                            target: "webhook_worker",
                            delivery_id = %delivery.id,
                            "Claim no longer held, skipping attempt"
                        );
                        return;
                    }
                    Err(e) => {
                        tracing::error!(
                            target: "webhook_worker",
                            delivery_id = %delivery.id,
                            error = %e,
                            "Failed to re-assert claim"
                        );
                        return;
                    }
                };

                if let Err(e) = service.process_delivery(&delivery).await {
                    tracing::error!(
                        target: "webhook_worker",
                        delivery_id = %delivery.id,
                        error = %e,
                        "Delivery processing failed"
                    );
                }
            });
        }
    }
}
