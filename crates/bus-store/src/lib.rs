//! # Bus Store - Partition Store Adapter
//!
//! The only crate that talks to the backing log. Everything above it
//! (core, delivery, audit) goes through the [`PartitionStore`] port.
//!
//! ## Layout
//!
//! - `ports` - the store port consumed by the bus core
//! - `memory` - in-memory reference adapter (also the test double)
//! - `types` - partition addressing and pending-entry bookkeeping

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod memory;
pub mod ports;
pub mod types;

// Re-export main types
pub use memory::InMemoryPartitionStore;
pub use ports::PartitionStore;
pub use types::{PartitionId, PendingEntry, StreamOffset};
