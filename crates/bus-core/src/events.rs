//! # Bus Events
//!
//! Notifications emitted by the core on every operation, consumed by the
//! audit trail. Carry only routing-level data plus a payload summary;
//! bodies and opaque data never leave the message store through this path.

use bus_types::{message::unix_now, Message};
use serde::{Deserialize, Serialize};

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusEventKind {
    /// A message was durably appended.
    Published,
    /// A message was handed to a consumer.
    Delivered,
    /// A consumer acknowledged a message.
    Acknowledged,
    /// A stale pending entry was reassigned to a new consumer.
    Claimed,
    /// A message exhausted its retries and was dead-lettered.
    DeadLettered,
    /// An operator replayed a dead-lettered message.
    Replayed,
}

/// A single bus operation, as seen by the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Operation kind.
    pub kind: BusEventKind,
    /// Id of the affected message.
    pub message_id: String,
    /// Acting agent: the sender for publishes, the consumer instance for
    /// delivery-side operations.
    pub agent_id: String,
    /// Consumer group involved, when the operation is group-scoped.
    pub group: Option<String>,
    /// Routing topic of the message.
    pub topic: String,
    /// Unix timestamp of the operation.
    pub timestamp: u64,
    /// Propagated trace id.
    pub trace_id: String,
    /// Redacted payload summary: subject and action only.
    pub payload_summary: String,
}

impl BusEvent {
    fn from_message(kind: BusEventKind, message: &Message, agent_id: String) -> Self {
        Self {
            kind,
            message_id: message.message_id.clone(),
            agent_id,
            group: None,
            topic: message.routing.topic.as_str().to_string(),
            timestamp: unix_now(),
            trace_id: message.audit.trace_id.clone(),
            payload_summary: format!(
                "{} [{}]",
                message.payload.subject, message.payload.action
            ),
        }
    }

    /// Event for a durable publish.
    #[must_use]
    pub fn published(message: &Message) -> Self {
        Self::from_message(
            BusEventKind::Published,
            message,
            message.routing.from.to_string(),
        )
    }

    /// Event for a delivery to a consumer instance.
    #[must_use]
    pub fn delivered(message: &Message, group: &str, consumer: &str) -> Self {
        let mut event =
            Self::from_message(BusEventKind::Delivered, message, consumer.to_string());
        event.group = Some(group.to_string());
        event
    }

    /// Event for an acknowledgment by a consumer instance.
    #[must_use]
    pub fn acknowledged(message: &Message, group: &str, consumer: &str) -> Self {
        let mut event =
            Self::from_message(BusEventKind::Acknowledged, message, consumer.to_string());
        event.group = Some(group.to_string());
        event
    }

    /// Event for a claim of a stale pending entry.
    #[must_use]
    pub fn claimed(message: &Message, group: &str, consumer: &str) -> Self {
        let mut event = Self::from_message(BusEventKind::Claimed, message, consumer.to_string());
        event.group = Some(group.to_string());
        event
    }

    /// Event for dead-letter escalation.
    #[must_use]
    pub fn dead_lettered(message: &Message) -> Self {
        Self::from_message(
            BusEventKind::DeadLettered,
            message,
            message.routing.from.to_string(),
        )
    }

    /// Event for an operator replay out of the DLQ.
    #[must_use]
    pub fn replayed(message: &Message) -> Self {
        Self::from_message(
            BusEventKind::Replayed,
            message,
            message.routing.from.to_string(),
        )
    }
}
