//! # Bus Types - Shared Schema for the AgentMesh Bus
//!
//! Single source of truth for the message data model, the wire validator,
//! MAC signing, configuration and the error taxonomy. Every other bus
//! crate builds on these types; none redefines them.
//!
//! ## Wire Format
//!
//! Messages are JSON-compatible:
//!
//! ```json
//! {"message_id":"msg-1",
//!  "routing":{"from":"agent-a","to":["agent-b"],"topic":"vision.review.complete"},
//!  "payload":{"subject":"Review done","action":"review_complete","priority":4,"data":{}},
//!  "metadata":{"ttl":86400,"retry_count":0,"max_retries":3,"idempotency_key":"k1","tags":[]},
//!  "audit":{"sender_version":"1.0","sender_instance_id":"a-1","trace_id":"t1","span_id":"s1"}}
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod dlq;
pub mod errors;
pub mod message;
pub mod security;
pub mod validator;

// Re-export main types
pub use config::BusConfig;
pub use dlq::{DlqRecord, FailureAttempt};
pub use errors::{BusError, DeliveryError, InvalidMessageError, SecurityError, StoreError};
pub use message::{
    AgentId, AuditInfo, Message, Metadata, Payload, Priority, Recipients, Routing, Topic,
    PRIORITY_MAX, PRIORITY_MIN,
};
pub use security::SigningKey;
pub use validator::{validate_json, validate_message, validate_value};
