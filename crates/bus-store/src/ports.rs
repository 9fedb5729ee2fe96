//! # Store Port
//!
//! The interface the bus core requires from a backing log. Any store that
//! offers partitioned append plus consumer-group cursors satisfies it; the
//! in-memory adapter in this crate is the reference implementation and the
//! test double.
//!
//! ## Semantics the adapter must uphold
//!
//! - Appends are durable and assign a monotonic per-partition offset.
//! - A group's cursor starts at the log end at registration time: no
//!   retroactive delivery of earlier appends.
//! - A message read by one consumer in a group is invisible to the others
//!   until acknowledged or reclaimed (mutual exclusion per message).
//! - `ack` is idempotent.

use crate::types::{PartitionId, PendingEntry, StreamOffset};
use async_trait::async_trait;
use bus_types::{DlqRecord, Message, StoreError};
use std::time::Duration;

/// Abstract interface over a partition-addressable append-only log.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Appends a message and returns its durable offset.
    async fn append(
        &self,
        partition: PartitionId,
        message: Message,
    ) -> Result<StreamOffset, StoreError>;

    /// Registers a consumer group on a partition.
    ///
    /// The group's cursor is pinned at the current log end, so only
    /// messages appended afterwards are delivered to it. Registering an
    /// existing group is a no-op.
    async fn create_group(&self, partition: PartitionId, group: &str) -> Result<(), StoreError>;

    /// Reads up to `max` undelivered messages for a consumer.
    ///
    /// Every returned message gets a pending entry bound to `consumer`.
    /// FIFO within the (partition, group) pair.
    async fn read_group(
        &self,
        partition: PartitionId,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<(StreamOffset, Message)>, StoreError>;

    /// Removes the pending entry for a message.
    ///
    /// Returns the acknowledged message and the consumer that held the
    /// claim, or `None` when nothing was pending; acknowledging an
    /// already-acknowledged id is a no-op, not an error.
    async fn ack(
        &self,
        partition: PartitionId,
        group: &str,
        message_id: &str,
    ) -> Result<Option<(Message, String)>, StoreError>;

    /// Reassigns pending entries idle for at least `idle_threshold` to
    /// `consumer` and returns the reclaimed messages.
    async fn claim(
        &self,
        partition: PartitionId,
        group: &str,
        consumer: &str,
        idle_threshold: Duration,
    ) -> Result<Vec<(StreamOffset, Message)>, StoreError>;

    /// Lists the group's pending entries.
    async fn pending(
        &self,
        partition: PartitionId,
        group: &str,
    ) -> Result<Vec<PendingEntry>, StoreError>;

    /// Number of entries currently retained in a partition.
    async fn partition_len(&self, partition: PartitionId) -> Result<usize, StoreError>;

    /// Drops entries appended before `cutoff_unix` (retention enforcement).
    ///
    /// Returns the number of entries removed. Pending entries keep their
    /// messages alive until acknowledged.
    async fn trim_older_than(
        &self,
        partition: PartitionId,
        cutoff_unix: u64,
    ) -> Result<usize, StoreError>;

    // =========================================================================
    // DEAD LETTER AREA
    // =========================================================================

    /// Appends a record to the dead-letter area.
    async fn append_dead_letter(&self, record: DlqRecord) -> Result<StreamOffset, StoreError>;

    /// All dead-letter records, oldest first.
    async fn dead_letters(&self) -> Result<Vec<DlqRecord>, StoreError>;

    /// Removes a dead-letter record by message id (operator replay/delete).
    async fn remove_dead_letter(&self, message_id: &str) -> Result<Option<DlqRecord>, StoreError>;

    /// Current dead-letter depth.
    async fn dead_letter_len(&self) -> Result<usize, StoreError>;
}
