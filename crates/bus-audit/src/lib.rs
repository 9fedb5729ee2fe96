//! # Bus Audit - Compliance Trail
//!
//! Asynchronous subscriber that mirrors every publish/deliver/ack/claim/
//! dead-letter event into a separately-retained, append-only record.
//!
//! Degrades gracefully by construction: the core emits events with
//! `try_send`, this crate writes them best-effort, and any loss is
//! surfaced as a gap count instead of a delivery failure.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod event;
pub mod service;
pub mod sink;

// Re-export main types
pub use event::AuditEvent;
pub use service::AuditTrail;
pub use sink::{AuditSink, MemoryAuditSink};
