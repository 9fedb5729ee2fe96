//! # Delivery Manager
//!
//! Wraps the bus core with the three-tier failure policy:
//!
//! - **Tier 1**: validation and signature failures are surfaced to the
//!   reporter untouched. They are caller bugs; retrying cannot help.
//! - **Tier 2**: transient store errors and consumer-reported processing
//!   failures wait out an exponential backoff, then the message is
//!   republished to the same partition with `retry_count + 1`. The retry
//!   is a new durable append; stored history is never edited.
//! - **Tier 3**: once `retry_count` exceeds `max_retries`, the message is
//!   wrapped in a [`DlqRecord`] carrying its full failure history and
//!   appended to the dead-letter area. Automatic retry stops; only an
//!   operator replay or delete touches it afterwards.
//!
//! The manager owns `retry_count` mutation and DLQ creation; consumers
//! never mutate messages.

use crate::backoff::Backoff;
use bus_core::{BusEvent, MessageBus};
use bus_store::{PartitionStore, StreamOffset};
use bus_types::{
    message::unix_now, BusError, DlqRecord, FailureAttempt, Message,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What the manager did with a reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Tier 1: not retryable, surfaced to the reporter.
    Rejected(BusError),
    /// Tier 2: republished after the given backoff delay.
    Retried {
        /// 1-based attempt number just recorded.
        attempt: u32,
        /// Backoff waited before the republish.
        delay: Duration,
    },
    /// Tier 3: escalated to the dead letter queue.
    DeadLettered,
}

/// Retry and dead-letter policy around a [`MessageBus`].
pub struct DeliveryManager {
    bus: Arc<MessageBus>,
    store: Arc<dyn PartitionStore>,
    backoff: Backoff,
    /// Failure history per in-flight message id, kept until the message
    /// is acknowledged or dead-lettered.
    failures: Mutex<HashMap<String, Vec<FailureAttempt>>>,
}

impl DeliveryManager {
    /// Creates a manager over the bus and its backing store.
    ///
    /// The store handle is used only for the dead-letter area; all
    /// partition traffic still flows through the core.
    #[must_use]
    pub fn new(bus: Arc<MessageBus>, store: Arc<dyn PartitionStore>) -> Self {
        let config = bus.config();
        let backoff = Backoff::new(config.backoff_base, config.backoff_ceiling);
        Self {
            bus,
            store,
            backoff,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Handles a failure reported for a delivered message.
    ///
    /// The consumer passes the message exactly as received; the manager
    /// decides the tier, performs the backoff and republish (or DLQ
    /// append), and acknowledges the failed delivery so it is not
    /// redelivered via the claim path on top of the retry.
    ///
    /// # Errors
    ///
    /// Only internal store failures during republish or DLQ append
    /// propagate; the reported failure itself is returned inside
    /// [`FailureOutcome`].
    pub async fn report_failure(
        &self,
        group: &str,
        message: &Message,
        failure: BusError,
    ) -> Result<FailureOutcome, BusError> {
        if !failure.is_retryable() {
            warn!(
                message_id = %message.message_id,
                %failure,
                "non-retryable failure surfaced to caller"
            );
            return Ok(FailureOutcome::Rejected(failure));
        }

        let attempt = message.metadata.retry_count + 1;
        self.record_attempt(message, attempt, &failure);

        if message.has_retry_budget() {
            let delay = self.backoff.delay(attempt);
            debug!(
                message_id = %message.message_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "scheduling retry"
            );
            tokio::time::sleep(delay).await;

            let retry = message.retry_copy();
            self.bus.publish(retry).await?;
            // Remove the failed delivery so claim passes do not duplicate
            // the retry we just appended.
            self.bus
                .acknowledge(message.priority(), group, &message.message_id)
                .await?;
            Ok(FailureOutcome::Retried { attempt, delay })
        } else {
            self.escalate(group, message).await?;
            Ok(FailureOutcome::DeadLettered)
        }
    }

    /// Clears the failure history once a message finally succeeds.
    ///
    /// Call alongside the consumer's acknowledge; a message that failed
    /// `max_retries - 1` times and then succeeds must leave no trace in
    /// the DLQ.
    pub async fn report_success(&self, group: &str, message: &Message) -> Result<(), BusError> {
        self.bus
            .acknowledge(message.priority(), group, &message.message_id)
            .await?;
        self.clear_history(&message.message_id);
        Ok(())
    }

    /// Current dead letter queue depth.
    pub async fn dlq_depth(&self) -> Result<usize, BusError> {
        Ok(self.store.dead_letter_len().await?)
    }

    /// True once the DLQ depth has crossed the alert threshold.
    ///
    /// The external observability layer polls this; the bus itself only
    /// exposes the signal.
    pub async fn dlq_alarm(&self) -> Result<bool, BusError> {
        Ok(self.dlq_depth().await? >= self.bus.config().dlq_alert_threshold)
    }

    /// All dead-letter records, oldest first.
    pub async fn dlq_entries(&self) -> Result<Vec<DlqRecord>, BusError> {
        Ok(self.store.dead_letters().await?)
    }

    /// Operator action: replays a dead-lettered message.
    ///
    /// The record is removed, `retry_count` reset to 0 and the message
    /// republished to its original priority partition. If the republish
    /// fails the record is restored, so the message is never lost.
    pub async fn replay(&self, message_id: &str) -> Result<Option<StreamOffset>, BusError> {
        let Some(record) = self.store.remove_dead_letter(message_id).await? else {
            return Ok(None);
        };

        let replay = record.original_message.replay_copy();
        match self.bus.publish(replay.clone()).await {
            Ok(offset) => {
                info!(message_id, "replayed dead-lettered message");
                self.bus.notify_audit(BusEvent::replayed(&replay));
                Ok(Some(offset))
            }
            Err(e) => {
                error!(message_id, %e, "replay publish failed; restoring DLQ record");
                self.store.append_dead_letter(record).await?;
                Err(e)
            }
        }
    }

    /// Operator action: permanently deletes a dead-letter record.
    pub async fn purge(&self, message_id: &str) -> Result<bool, BusError> {
        Ok(self.store.remove_dead_letter(message_id).await?.is_some())
    }

    async fn escalate(&self, group: &str, message: &Message) -> Result<(), BusError> {
        let history = self
            .take_history(&message.message_id)
            .unwrap_or_else(|| {
                // Failure reported without prior history (e.g. manager
                // restarted mid-flight): record at least this attempt.
                vec![FailureAttempt {
                    attempt: message.metadata.retry_count + 1,
                    error: "retry budget exhausted".into(),
                    timestamp: unix_now(),
                }]
            });

        let record = DlqRecord::new(message.clone(), history);
        self.store.append_dead_letter(record).await?;
        self.bus
            .acknowledge(message.priority(), group, &message.message_id)
            .await?;
        self.bus.notify_audit(BusEvent::dead_lettered(message));

        let depth = self.store.dead_letter_len().await?;
        let threshold = self.bus.config().dlq_alert_threshold;
        if depth >= threshold {
            warn!(depth, threshold, "dead letter queue above alert threshold");
        }
        error!(
            message_id = %message.message_id,
            attempts = message.metadata.retry_count + 1,
            "message dead-lettered after exhausting retries"
        );
        Ok(())
    }

    fn record_attempt(&self, message: &Message, attempt: u32, failure: &BusError) {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures
            .entry(message.message_id.clone())
            .or_default()
            .push(FailureAttempt {
                attempt,
                error: failure.to_string(),
                timestamp: unix_now(),
            });
    }

    fn take_history(&self, message_id: &str) -> Option<Vec<FailureAttempt>> {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.remove(message_id)
    }

    fn clear_history(&self, message_id: &str) {
        self.take_history(message_id);
    }
}
