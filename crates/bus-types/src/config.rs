//! # Bus Configuration
//!
//! One config struct shared by every bus crate. Retention for the audit
//! store is configured independently of the message store and is normally
//! much longer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Recognized configuration options for the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Number of priority partitions. The wire schema fixes this at 5.
    pub priority_levels: u8,

    /// Default retry budget before dead-letter escalation.
    pub max_retries: u32,

    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,

    /// Upper bound on any single backoff delay.
    pub backoff_ceiling: Duration,

    /// Pending entries idle longer than this become claimable.
    pub claim_idle_threshold: Duration,

    /// Message store retention.
    pub retention_days: u32,

    /// Audit store retention. Independent of (and normally much longer
    /// than) `retention_days`.
    pub audit_retention_days: u32,

    /// DLQ depth at which the alarm accessor trips.
    pub dlq_alert_threshold: usize,

    /// Audit events buffered per flush.
    pub audit_batch_size: usize,

    /// Maximum time an audit event waits before its batch is flushed.
    pub audit_flush_interval: Duration,

    /// Capacity of the core-to-audit channel. When full, events are
    /// counted as gaps instead of blocking delivery.
    pub audit_channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            priority_levels: 5,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(60),
            claim_idle_threshold: Duration::from_secs(30),
            retention_days: 30,
            audit_retention_days: 730,
            dlq_alert_threshold: 100,
            audit_batch_size: 64,
            audit_flush_interval: Duration::from_secs(1),
            audit_channel_capacity: 1024,
        }
    }
}

impl BusConfig {
    /// Config with short timings for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            backoff_base: Duration::from_millis(1),
            backoff_ceiling: Duration::from_millis(8),
            claim_idle_threshold: Duration::from_millis(50),
            dlq_alert_threshold: 2,
            audit_batch_size: 4,
            audit_flush_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }
}
