//! # Bus Delivery - Retry and Dead-Letter Policy
//!
//! Failure handling around the bus core. Publishers see none of this:
//! once `publish` returned an offset, Tier 2/3 handling is internal and
//! every terminal failure leaves a durable, inspectable record.
//!
//! Duplicates are possible across a retry boundary (at-least-once);
//! consumers deduplicate on `metadata.idempotency_key`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod backoff;
pub mod manager;

// Re-export main types
pub use backoff::Backoff;
pub use manager::{DeliveryManager, FailureOutcome};
