//! Outbox Dispatcher
//!
//! Background worker that drains pending outbox rows and hands them to a
//! publisher, at-least-once. Consumers must dedup on the row's dedup_key
//! (or entry_id) and order by sequence within a pair.
//!
//! The dispatcher never holds a database transaction across a publish: a
//! slow or hung publisher cannot pin row locks or block the mutation path.
//! Per-pair order is preserved because rows are drained in (pair_id,
//! sequence) order and a failed row parks its pair for the rest of the
//! cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::store::LedgerStore;
use crate::wallet::error::WalletError;

use super::OutboxEvent;

/// Configuration for the outbox dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How often to poll for pending events
    pub poll_interval: Duration,
    /// Maximum events to drain per cycle
    pub batch_size: i64,
    /// Maximum events fetched per pair within one batch, so a pair with a
    /// failing publisher and a deep backlog cannot starve the others
    pub per_pair_batch: i64,
    /// Base delay for the exponential retry backoff
    pub retry_base: Duration,
    /// Cap on the retry backoff
    pub retry_max: Duration,
    /// Retry count at which a stuck event is escalated in the logs
    pub alert_after_retries: i32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 100,
            per_pair_batch: 10,
            retry_base: Duration::from_secs(1),
            retry_max: Duration::from_secs(60),
            alert_after_retries: 10,
        }
    }
}

/// Downstream delivery seam. Implementations must tolerate duplicate
/// delivery of the same event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), String>;
}

/// Publisher that emits events to the structured log. Stands in for a real
/// message broker in development and tests.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), String> {
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            pair_id = %event.pair_id,
            sequence = event.sequence,
            payload = %event.payload,
            "Outbox event published"
        );
        Ok(())
    }
}

/// Outbox Dispatcher
///
/// Periodically drains pending events in (pair_id, sequence) order and
/// publishes them. A failed publish marks the row error, bumps its retry
/// count, and parks the whole pair until the next cycle so per-pair order
/// never inverts.
pub struct OutboxDispatcher {
    store: Arc<dyn LedgerStore>,
    publisher: Arc<dyn EventPublisher>,
    config: DispatcherConfig,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        publisher: Arc<dyn EventPublisher>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    pub fn with_defaults(store: Arc<dyn LedgerStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::new(store, publisher, DispatcherConfig::default())
    }

    /// Run the dispatch loop forever.
    pub async fn run(&self) -> ! {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Starting outbox dispatcher"
        );

        loop {
            if let Err(e) = self.drain_once().await {
                error!(error = %e, "Outbox drain cycle failed");
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Run a single drain cycle. Returns the number of events published.
    pub async fn drain_once(&self) -> Result<usize, WalletError> {
        let pending = self
            .store
            .fetch_pending(self.config.batch_size, self.config.per_pair_batch)
            .await?;
        if pending.is_empty() {
            debug!("No pending outbox events");
            return Ok(0);
        }

        let now = Utc::now();
        let mut published = 0usize;
        // Pairs whose head event failed or is still backing off; later
        // events of the same pair must wait behind it.
        let mut parked: HashSet<Uuid> = HashSet::new();

        for event in &pending {
            if parked.contains(&event.pair_id) {
                continue;
            }

            if event.retry_count > 0 {
                let wait = self.backoff(event.retry_count);
                let since_attempt = (now - event.updated_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if since_attempt < wait {
                    parked.insert(event.pair_id);
                    continue;
                }
            }

            if event.retry_count >= self.config.alert_after_retries {
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    retry_count = event.retry_count,
                    "Outbox event stuck after many retries"
                );
            }

            match self.publisher.publish(event).await {
                Ok(()) => {
                    self.store.mark_sent(event.id).await?;
                    published += 1;
                }
                Err(msg) => {
                    error!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        retry_count = event.retry_count,
                        error = %msg,
                        "Publish failed"
                    );
                    self.store.mark_error(event.id, &msg).await?;
                    parked.insert(event.pair_id);
                }
            }
        }

        if published > 0 {
            debug!(count = published, "Published outbox events");
        }
        Ok(published)
    }

    /// Exponential backoff doubling per retry, capped at `retry_max`.
    fn backoff(&self, retry_count: i32) -> Duration {
        let shift = retry_count.clamp(0, 20) as u32;
        let delay = self
            .config
            .retry_base
            .saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
        delay.min(self.config.retry_max)
    }
}
