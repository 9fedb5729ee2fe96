//! # Bus Core - Publish/Subscribe for Agent Messages
//!
//! The public surface of the bus: publish, subscribe, acknowledge and
//! claim over five priority partitions with consumer-group fan-out.
//!
//! ```text
//! ┌──────────┐ publish()              subscribe()/ack() ┌──────────┐
//! │ Producer │ ───────┐                     ┌────────── │ Consumer │
//! └──────────┘        ▼                     ▼           └──────────┘
//!               ┌───────────────────────────────┐
//!               │  MessageBus (p5 → p1 scan)    │──▶ audit events
//!               └───────────────────────────────┘
//!                        │ PartitionStore port
//!                        ▼
//!                  backing log
//! ```
//!
//! Delivery is at-least-once: unacknowledged messages are recovered via
//! the claim protocol, and consumers deduplicate on `idempotency_key`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod events;

// Re-export main types
pub use bus::MessageBus;
pub use events::{BusEvent, BusEventKind};
