//! # Store Types
//!
//! Addressing and bookkeeping types for the partition store.

use bus_types::Priority;
use std::fmt;
use std::time::Instant;

/// Address of one append-only log inside the store: one per priority
/// level. The dead-letter area is addressed through the store's typed
/// dead-letter operations rather than a partition id, since its entries
/// are records, not messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId(Priority);

impl PartitionId {
    /// Partition for a priority level.
    #[must_use]
    pub fn for_priority(priority: Priority) -> Self {
        Self(priority)
    }

    /// The priority level this partition carries.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.0
    }

    /// Stable name used in logs and errors (`p1`..`p5`).
    #[must_use]
    pub fn name(&self) -> String {
        format!("p{}", self.0.level())
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Store-assigned position within a partition. Monotonic per partition;
/// returned from `append` as the durable publish confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamOffset(pub u64);

impl fmt::Display for StreamOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A delivered-but-unacknowledged message tracked by the store.
///
/// Created on read, removed on acknowledge, reassignable via claim once
/// idle beyond the configured threshold.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Id of the pending message.
    pub message_id: String,
    /// Offset of the message in its partition.
    pub offset: StreamOffset,
    /// Consumer instance currently holding the claim.
    pub consumer: String,
    /// When the current claim was handed out.
    pub delivered_at: Instant,
    /// Total deliveries of this message, including claims.
    pub delivery_count: u32,
}
