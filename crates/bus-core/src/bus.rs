//! # Message Bus Core
//!
//! Publish/subscribe/acknowledge/claim over the partition store. One
//! instance is constructed at process start and shared via `Arc`; there is
//! no global bus state.
//!
//! ## Scheduling policy
//!
//! `subscribe` scans partitions in strict priority order (5 down to 1), so
//! a non-empty high-priority partition is always drained before lower ones
//! are polled. Starvation of priority 5 is never acceptable; starvation of
//! priority 1 under sustained load is accepted by design.

use crate::events::BusEvent;
use bus_store::{PartitionId, PartitionStore, PendingEntry, StreamOffset};
use bus_types::{
    message::unix_now, validate_json, validate_message, BusConfig, BusError, Message, Priority,
    Recipients, SigningKey,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// The bus core. Sole entry point for producers and consumers.
pub struct MessageBus {
    store: Arc<dyn PartitionStore>,
    config: BusConfig,
    signing_key: Option<SigningKey>,
    audit_tx: Option<mpsc::Sender<BusEvent>>,
    published: AtomicU64,
    audit_dropped: AtomicU64,
}

impl MessageBus {
    /// Creates a bus over a partition store.
    #[must_use]
    pub fn new(store: Arc<dyn PartitionStore>, config: BusConfig) -> Self {
        Self {
            store,
            config,
            signing_key: None,
            audit_tx: None,
            published: AtomicU64::new(0),
            audit_dropped: AtomicU64::new(0),
        }
    }

    /// Enables MAC verification: every published message must carry a
    /// valid signature under this key.
    #[must_use]
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Attaches the audit channel and returns its receiving half.
    ///
    /// Events are sent with `try_send`; if the audit side falls behind,
    /// events are dropped and counted, never blocking an operation.
    #[must_use]
    pub fn with_audit_channel(mut self) -> (Self, mpsc::Receiver<BusEvent>) {
        let (tx, rx) = mpsc::channel(self.config.audit_channel_capacity);
        self.audit_tx = Some(tx);
        (self, rx)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Total successful publishes on this instance.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Audit events dropped because the channel was full or closed.
    #[must_use]
    pub fn audit_dropped(&self) -> u64 {
        self.audit_dropped.load(Ordering::Relaxed)
    }

    /// Emits an audit notification. Best-effort by construction.
    ///
    /// Public because the delivery manager reports dead-letter and replay
    /// events through the same channel.
    pub fn notify_audit(&self, event: BusEvent) {
        if let Some(tx) = &self.audit_tx {
            if tx.try_send(event).is_err() {
                self.audit_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("audit channel full or closed; event dropped and counted as gap");
            }
        }
    }

    /// Registers a consumer group on every priority partition.
    ///
    /// A group only sees messages appended after registration (no
    /// retroactive delivery), so consumers register before producers start.
    pub async fn register_group(&self, group: &str) -> Result<(), BusError> {
        for priority in Priority::descending() {
            self.store
                .create_group(PartitionId::for_priority(priority), group)
                .await?;
        }
        debug!(group, "registered consumer group on all partitions");
        Ok(())
    }

    /// Publishes a message to its priority partition.
    ///
    /// Validation and signature failures surface synchronously; the
    /// returned offset is the durable publish confirmation.
    pub async fn publish(&self, message: Message) -> Result<StreamOffset, BusError> {
        validate_message(&message)?;
        if let Some(key) = &self.signing_key {
            key.verify(&message)?;
        }

        let partition = PartitionId::for_priority(message.priority());
        let event = BusEvent::published(&message);
        let offset = self.store.append(partition, message).await?;

        self.published.fetch_add(1, Ordering::Relaxed);
        self.notify_audit(event);
        debug!(partition = %partition, offset = %offset, "message published");
        Ok(offset)
    }

    /// Validates raw JSON from a gateway and publishes it.
    pub async fn publish_json(&self, raw: &str) -> Result<StreamOffset, BusError> {
        let message = validate_json(raw)?;
        self.publish(message).await
    }

    /// Publishes to every group by setting the broadcast wildcard.
    ///
    /// Each registered group maintains its own cursor over the partition,
    /// so one broadcast append is durably read once per group.
    pub async fn broadcast(&self, mut message: Message) -> Result<StreamOffset, BusError> {
        message.routing.to = Recipients::Broadcast;
        self.publish(message).await
    }

    /// Reads up to `batch_size` messages for a consumer instance.
    ///
    /// Scans partitions 5 down to 1 and never polls a lower partition
    /// while a higher one still has undelivered messages. The optional
    /// deadline is checked between store calls; on expiry whatever was
    /// read so far is returned, possibly empty, never an error.
    pub async fn subscribe(
        &self,
        group: &str,
        consumer: &str,
        batch_size: usize,
        deadline: Option<Duration>,
    ) -> Result<Vec<Message>, BusError> {
        let expires_at = deadline.map(|d| Instant::now() + d);
        let mut batch = Vec::new();

        for priority in Priority::descending() {
            if batch.len() >= batch_size {
                break;
            }
            if let Some(at) = expires_at {
                if Instant::now() >= at {
                    break;
                }
            }

            let partition = PartitionId::for_priority(priority);
            let read = self
                .store
                .read_group(partition, group, consumer, batch_size - batch.len())
                .await?;

            for (_, message) in read {
                self.notify_audit(BusEvent::delivered(&message, group, consumer));
                batch.push(message);
            }
        }

        Ok(batch)
    }

    /// Acknowledges a delivered message.
    ///
    /// Idempotent: acknowledging an already-acknowledged id is a no-op.
    pub async fn acknowledge(
        &self,
        priority: Priority,
        group: &str,
        message_id: &str,
    ) -> Result<(), BusError> {
        let removed = self
            .store
            .ack(PartitionId::for_priority(priority), group, message_id)
            .await?;
        if let Some((message, consumer)) = removed {
            self.notify_audit(BusEvent::acknowledged(&message, group, &consumer));
        }
        Ok(())
    }

    /// Reclaims pending entries idle beyond the configured threshold.
    ///
    /// This is what makes delivery at-least-once: a crashed consumer's
    /// messages are recovered the next time any instance runs a claim
    /// pass. Intended to run as a periodic background task.
    pub async fn claim_stale(
        &self,
        group: &str,
        consumer: &str,
    ) -> Result<Vec<Message>, BusError> {
        let mut reclaimed = Vec::new();
        for priority in Priority::descending() {
            let claimed = self
                .store
                .claim(
                    PartitionId::for_priority(priority),
                    group,
                    consumer,
                    self.config.claim_idle_threshold,
                )
                .await?;
            for (_, message) in claimed {
                self.notify_audit(BusEvent::claimed(&message, group, consumer));
                reclaimed.push(message);
            }
        }
        if !reclaimed.is_empty() {
            warn!(
                group,
                consumer,
                count = reclaimed.len(),
                "reclaimed stale deliveries"
            );
        }
        Ok(reclaimed)
    }

    /// Pending (delivered, unacknowledged) entries for a group.
    pub async fn pending(
        &self,
        priority: Priority,
        group: &str,
    ) -> Result<Vec<PendingEntry>, BusError> {
        Ok(self
            .store
            .pending(PartitionId::for_priority(priority), group)
            .await?)
    }

    /// Enforces message-store retention across all priority partitions.
    ///
    /// Returns the number of entries dropped. The audit store has its own,
    /// longer retention and is untouched here.
    pub async fn run_retention(&self) -> Result<usize, BusError> {
        let cutoff = unix_now().saturating_sub(u64::from(self.config.retention_days) * 86_400);
        let mut removed = 0;
        for priority in Priority::descending() {
            removed += self
                .store
                .trim_older_than(PartitionId::for_priority(priority), cutoff)
                .await?;
        }
        Ok(removed)
    }
}
