//! # Message Schema
//!
//! The wire shape of everything that moves through the bus.
//!
//! ## Mutability Rules
//!
//! - `message_id` and `routing.from` never change after creation.
//! - Only `metadata.retry_count` and the signature state are mutable, and
//!   only by the delivery manager (always via a republished copy, never by
//!   editing stored history).
//! - `payload.data` is opaque: the bus routes on `routing`, `priority` and
//!   `metadata` and never inspects the data value.

use crate::errors::InvalidMessageError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Lowest valid priority.
pub const PRIORITY_MIN: u8 = 1;

/// Highest valid priority. Partition `p5` is always drained first.
pub const PRIORITY_MAX: u8 = 5;

/// Identifier of an agent process. Lowercase alphanumerics and hyphens only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Parses an agent id, rejecting anything outside `[a-z0-9-]+`.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidMessageError> {
        let s = s.into();
        if !Self::is_valid_name(&s) {
            return Err(InvalidMessageError::new(
                "routing.from",
                format!("'{s}' does not match [a-z0-9-]+"),
            ));
        }
        Ok(Self(s))
    }

    /// Returns true if the string is a well-formed agent name.
    #[must_use]
    pub fn is_valid_name(s: &str) -> bool {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    /// The agent name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hierarchical dot-separated topic, e.g. `vision.review.complete`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Parses a topic, rejecting empty strings and empty segments.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidMessageError> {
        let s = s.into();
        if s.is_empty() || s.split('.').any(|seg| seg.is_empty()) {
            return Err(InvalidMessageError::new(
                "routing.topic",
                "topic must be non-empty dot-separated segments",
            ));
        }
        Ok(Self(s))
    }

    /// The topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the topic's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recipient set of a message.
///
/// Serialized as `"*"` for broadcast or a JSON array of agent names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every consumer group receives the message.
    Broadcast,
    /// Named recipients.
    Agents(BTreeSet<AgentId>),
}

impl Recipients {
    /// Builds a recipient set from a list of agent ids.
    #[must_use]
    pub fn agents<I: IntoIterator<Item = AgentId>>(agents: I) -> Self {
        Recipients::Agents(agents.into_iter().collect())
    }

    /// Single-recipient convenience constructor.
    #[must_use]
    pub fn single(agent: AgentId) -> Self {
        Recipients::Agents(std::iter::once(agent).collect())
    }

    /// Returns true for the broadcast wildcard.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Recipients::Broadcast)
    }
}

impl Serialize for Recipients {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Recipients::Broadcast => serializer.serialize_str("*"),
            Recipients::Agents(agents) => agents.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Recipients {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecipientsVisitor;

        impl<'de> serde::de::Visitor<'de> for RecipientsVisitor {
            type Value = Recipients;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"*\" or an array of agent names")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Recipients, E> {
                if v == "*" {
                    Ok(Recipients::Broadcast)
                } else {
                    Err(E::custom("only \"*\" is valid as a string recipient"))
                }
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Recipients, A::Error> {
                let mut agents = BTreeSet::new();
                while let Some(agent) = seq.next_element::<AgentId>()? {
                    agents.insert(agent);
                }
                Ok(Recipients::Agents(agents))
            }
        }

        deserializer.deserialize_any(RecipientsVisitor)
    }
}

/// Message priority, 1 (lowest) to 5 (highest).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority.
    pub const LOW: Priority = Priority(PRIORITY_MIN);

    /// Highest priority. Never starved by design.
    pub const CRITICAL: Priority = Priority(PRIORITY_MAX);

    /// Validated constructor.
    pub fn new(level: u8) -> Result<Self, InvalidMessageError> {
        if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&level) {
            return Err(InvalidMessageError::new(
                "payload.priority",
                format!("{level} is outside 1..=5"),
            ));
        }
        Ok(Self(level))
    }

    /// The numeric level.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Returns true if the raw level is within the valid range.
    #[must_use]
    pub fn in_range(level: u8) -> bool {
        (PRIORITY_MIN..=PRIORITY_MAX).contains(&level)
    }

    /// All priorities in strict scheduling order, highest first.
    pub fn descending() -> impl Iterator<Item = Priority> {
        (PRIORITY_MIN..=PRIORITY_MAX).rev().map(Priority)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing header: who sent the message and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    /// Originating agent. Immutable after creation.
    pub from: AgentId,

    /// Recipient set, or the broadcast wildcard.
    pub to: Recipients,

    /// Hierarchical routing topic.
    pub topic: Topic,

    /// Channel to publish an asynchronous reply to, if one is expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Topic>,

    /// Correlates a reply with the request that caused it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Caller-visible payload. `data` is opaque to every bus component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Short human-readable subject line.
    #[serde(default)]
    pub subject: String,

    /// Free-form body text.
    #[serde(default)]
    pub body: String,

    /// Machine-readable action name for the consumer.
    #[serde(default)]
    pub action: String,

    /// Scheduling priority, 1..=5.
    pub priority: Priority,

    /// Opaque caller-defined structure. The bus never inspects this.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Delivery bookkeeping attached to every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Time-to-live in seconds, relative to publish time.
    #[serde(rename = "ttl", default = "Metadata::default_ttl")]
    pub ttl_seconds: u64,

    /// Number of delivery attempts already consumed. Starts at 0; bumped
    /// only by the delivery manager via republish.
    #[serde(default)]
    pub retry_count: u32,

    /// Retry budget before dead-letter escalation.
    #[serde(default = "Metadata::default_max_retries")]
    pub max_retries: u32,

    /// Consumer-side deduplication key. Required on the wire.
    pub idempotency_key: String,

    /// Free-form classification tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Metadata {
    fn default_ttl() -> u64 {
        86_400
    }

    fn default_max_retries() -> u32 {
        3
    }
}

/// Provenance and tracing data, including the optional MAC.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    /// Version string of the sending agent.
    #[serde(default)]
    pub sender_version: String,

    /// Instance id of the sending process (an agent may run many).
    #[serde(default)]
    pub sender_instance_id: String,

    /// Distributed trace id, propagated into audit events.
    #[serde(default)]
    pub trace_id: String,

    /// Span id within the trace.
    #[serde(default)]
    pub span_id: String,

    /// Optional HMAC-SHA256 over the message's signed fields.
    #[serde_as(as = "Option<Bytes>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<[u8; 32]>,
}

impl Default for AuditInfo {
    fn default() -> Self {
        Self {
            sender_version: String::new(),
            sender_instance_id: String::new(),
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            signature: None,
        }
    }
}

/// The unit of communication between agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique id, assigned at creation, immutable.
    pub message_id: String,

    /// Routing header.
    pub routing: Routing,

    /// Caller payload.
    pub payload: Payload,

    /// Delivery bookkeeping.
    pub metadata: Metadata,

    /// Provenance, tracing and signature state.
    #[serde(default)]
    pub audit: AuditInfo,
}

impl Message {
    /// Creates a message with a fresh id and default metadata.
    #[must_use]
    pub fn new(from: AgentId, to: Recipients, topic: Topic, priority: Priority) -> Self {
        Self {
            message_id: format!("msg-{}", Uuid::new_v4()),
            routing: Routing {
                from,
                to,
                topic,
                reply_to: None,
                correlation_id: None,
            },
            payload: Payload {
                subject: String::new(),
                body: String::new(),
                action: String::new(),
                priority,
                data: serde_json::Value::Null,
            },
            metadata: Metadata {
                ttl_seconds: Metadata::default_ttl(),
                retry_count: 0,
                max_retries: Metadata::default_max_retries(),
                idempotency_key: Uuid::new_v4().to_string(),
                tags: BTreeSet::new(),
            },
            audit: AuditInfo::default(),
        }
    }

    /// Sets the subject line.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.payload.subject = subject.into();
        self
    }

    /// Sets the body text.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.payload.body = body.into();
        self
    }

    /// Sets the consumer-facing action name.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.payload.action = action.into();
        self
    }

    /// Attaches opaque caller data.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.payload.data = data;
        self
    }

    /// Sets the reply channel for asynchronous responses.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: Topic) -> Self {
        self.routing.reply_to = Some(reply_to);
        self
    }

    /// Sets the correlation id linking a reply to its request.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.routing.correlation_id = Some(correlation_id.into());
        self
    }

    /// Overrides the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.metadata.max_retries = max_retries;
        self
    }

    /// Overrides the deduplication key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.metadata.idempotency_key = key.into();
        self
    }

    /// The scheduling priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.payload.priority
    }

    /// Returns true if a further retry is allowed before dead-lettering.
    #[must_use]
    pub fn has_retry_budget(&self) -> bool {
        self.metadata.retry_count < self.metadata.max_retries
    }

    /// A retry copy: identical message with `retry_count` bumped by one.
    ///
    /// This is the only sanctioned way to advance the retry counter. The
    /// copy is republished as a new durable append; stored history is
    /// never edited in place.
    #[must_use]
    pub fn retry_copy(&self) -> Message {
        let mut copy = self.clone();
        copy.metadata.retry_count += 1;
        copy
    }

    /// A replay copy for operator-initiated DLQ replay: counter reset to 0.
    #[must_use]
    pub fn replay_copy(&self) -> Message {
        let mut copy = self.clone();
        copy.metadata.retry_count = 0;
        copy
    }
}

/// Current Unix timestamp in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
