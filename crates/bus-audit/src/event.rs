//! # Audit Events
//!
//! Write-once compliance rows. An [`AuditEvent`] is a redacted projection
//! of a bus operation: routing-level facts plus a payload summary, never
//! the body or the opaque data value. Rows are retained under the audit
//! store's own policy, which outlives the message store's by design
//! (years versus months).

use bus_core::{BusEvent, BusEventKind};
use serde::{Deserialize, Serialize};

/// One immutable row in the compliance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Kind of bus operation.
    pub event_type: BusEventKind,
    /// Id of the affected message.
    pub message_id: String,
    /// Acting agent or consumer instance.
    pub agent_id: String,
    /// Consumer group, for group-scoped operations.
    pub group: Option<String>,
    /// Routing topic.
    pub topic: String,
    /// Unix timestamp of the operation.
    pub timestamp: u64,
    /// Propagated trace id.
    pub trace_id: String,
    /// Subject and action only; bodies are never mirrored.
    pub payload_summary: String,
}

impl From<BusEvent> for AuditEvent {
    fn from(event: BusEvent) -> Self {
        Self {
            event_type: event.kind,
            message_id: event.message_id,
            agent_id: event.agent_id,
            group: event.group,
            topic: event.topic,
            timestamp: event.timestamp,
            trace_id: event.trace_id,
            payload_summary: event.payload_summary,
        }
    }
}
