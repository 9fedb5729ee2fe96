//! # In-Memory Partition Store
//!
//! Reference implementation of the [`PartitionStore`] port. Holds every
//! partition as an append-only `Vec` with per-group cursors and pending
//! maps under one lock, so group cursor movement and pending mutation are
//! atomic with respect to each other.
//!
//! Production deployments put a networked log behind the same port; this
//! adapter also serves as the test double, including a fault-injection
//! switch for transient-failure paths.

use crate::ports::PartitionStore;
use crate::types::{PartitionId, PendingEntry, StreamOffset};
use async_trait::async_trait;
use bus_types::{message::unix_now, DlqRecord, Message, StoreError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredEntry {
    offset: u64,
    appended_at: u64,
    message: Message,
}

#[derive(Debug, Clone)]
struct PendingRow {
    message_id: String,
    consumer: String,
    delivered_at: Instant,
    delivery_count: u32,
}

#[derive(Debug, Default)]
struct GroupState {
    /// Next offset this group has not yet delivered.
    cursor: u64,
    /// Pending rows ordered by offset (FIFO for claim scans).
    pending: BTreeMap<u64, PendingRow>,
    /// message_id -> offset index for idempotent acks.
    by_id: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct PartitionState {
    log: Vec<StoredEntry>,
    next_offset: u64,
    groups: HashMap<String, GroupState>,
}

impl PartitionState {
    fn entry_at(&self, offset: u64) -> Option<&StoredEntry> {
        self.log
            .binary_search_by_key(&offset, |e| e.offset)
            .ok()
            .map(|i| &self.log[i])
    }
}

/// In-memory [`PartitionStore`] adapter.
#[derive(Default)]
pub struct InMemoryPartitionStore {
    inner: RwLock<HashMap<PartitionId, PartitionState>>,
    dead_letters: RwLock<Vec<DlqRecord>>,
    fail_next_append: AtomicBool,
}

impl InMemoryPartitionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `append` fail with [`StoreError::Unavailable`].
    ///
    /// Test hook for the transient-failure tier.
    pub fn fail_next_append(&self) {
        self.fail_next_append.store(true, Ordering::SeqCst);
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PartitionId, PartitionState>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PartitionId, PartitionState>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PartitionStore for InMemoryPartitionStore {
    async fn append(
        &self,
        partition: PartitionId,
        message: Message,
    ) -> Result<StreamOffset, StoreError> {
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected append fault".into()));
        }

        let mut inner = self.write_lock();
        let state = inner.entry(partition).or_default();
        let offset = state.next_offset;
        state.next_offset += 1;
        state.log.push(StoredEntry {
            offset,
            appended_at: unix_now(),
            message,
        });
        debug!(partition = %partition, offset, "appended entry");
        Ok(StreamOffset(offset))
    }

    async fn create_group(&self, partition: PartitionId, group: &str) -> Result<(), StoreError> {
        let mut inner = self.write_lock();
        let state = inner.entry(partition).or_default();
        let end = state.next_offset;
        state.groups.entry(group.to_string()).or_insert_with(|| {
            debug!(partition = %partition, group, cursor = end, "registered consumer group");
            GroupState {
                cursor: end,
                ..Default::default()
            }
        });
        Ok(())
    }

    async fn read_group(
        &self,
        partition: PartitionId,
        group: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<(StreamOffset, Message)>, StoreError> {
        let mut inner = self.write_lock();
        let state = inner
            .get_mut(&partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.name()))?;

        let cursor = state
            .groups
            .get(group)
            .ok_or_else(|| StoreError::UnknownGroup {
                partition: partition.name(),
                group: group.to_string(),
            })?
            .cursor;

        let start = state.log.partition_point(|e| e.offset < cursor);
        let batch: Vec<(StreamOffset, Message)> = state.log[start..]
            .iter()
            .take(max)
            .map(|e| (StreamOffset(e.offset), e.message.clone()))
            .collect();

        if let (Some((last, _)), Some(group_state)) = (batch.last(), state.groups.get_mut(group)) {
            let now = Instant::now();
            for (offset, message) in &batch {
                group_state.pending.insert(
                    offset.0,
                    PendingRow {
                        message_id: message.message_id.clone(),
                        consumer: consumer.to_string(),
                        delivered_at: now,
                        delivery_count: 1,
                    },
                );
                group_state
                    .by_id
                    .insert(message.message_id.clone(), offset.0);
            }
            group_state.cursor = last.0 + 1;
        }

        Ok(batch)
    }

    async fn ack(
        &self,
        partition: PartitionId,
        group: &str,
        message_id: &str,
    ) -> Result<Option<(Message, String)>, StoreError> {
        let mut inner = self.write_lock();
        let Some(state) = inner.get_mut(&partition) else {
            return Ok(None);
        };
        let Some(group_state) = state.groups.get_mut(group) else {
            return Ok(None);
        };
        let Some(offset) = group_state.by_id.remove(message_id) else {
            return Ok(None);
        };
        let consumer = group_state
            .pending
            .remove(&offset)
            .map(|row| row.consumer)
            .unwrap_or_default();
        Ok(state
            .entry_at(offset)
            .map(|entry| (entry.message.clone(), consumer)))
    }

    async fn claim(
        &self,
        partition: PartitionId,
        group: &str,
        consumer: &str,
        idle_threshold: Duration,
    ) -> Result<Vec<(StreamOffset, Message)>, StoreError> {
        let mut inner = self.write_lock();
        let Some(state) = inner.get_mut(&partition) else {
            return Ok(Vec::new());
        };

        let stale: Vec<u64> = state
            .groups
            .get(group)
            .map(|g| {
                g.pending
                    .iter()
                    .filter(|(_, row)| row.delivered_at.elapsed() >= idle_threshold)
                    .map(|(offset, _)| *offset)
                    .collect()
            })
            .unwrap_or_default();

        let mut claimed = Vec::with_capacity(stale.len());
        for offset in stale {
            let Some(entry) = state.entry_at(offset).cloned() else {
                continue;
            };
            let Some(group_state) = state.groups.get_mut(group) else {
                break;
            };
            if let Some(row) = group_state.pending.get_mut(&offset) {
                row.consumer = consumer.to_string();
                row.delivered_at = Instant::now();
                row.delivery_count += 1;
                claimed.push((StreamOffset(offset), entry.message));
            }
        }

        if !claimed.is_empty() {
            debug!(
                partition = %partition,
                group,
                consumer,
                count = claimed.len(),
                "reclaimed stale pending entries"
            );
        }
        Ok(claimed)
    }

    async fn pending(
        &self,
        partition: PartitionId,
        group: &str,
    ) -> Result<Vec<PendingEntry>, StoreError> {
        let inner = self.read_lock();
        Ok(inner
            .get(&partition)
            .and_then(|state| state.groups.get(group))
            .map(|g| {
                g.pending
                    .iter()
                    .map(|(offset, row)| PendingEntry {
                        message_id: row.message_id.clone(),
                        offset: StreamOffset(*offset),
                        consumer: row.consumer.clone(),
                        delivered_at: row.delivered_at,
                        delivery_count: row.delivery_count,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn partition_len(&self, partition: PartitionId) -> Result<usize, StoreError> {
        let inner = self.read_lock();
        Ok(inner.get(&partition).map_or(0, |s| s.log.len()))
    }

    async fn trim_older_than(
        &self,
        partition: PartitionId,
        cutoff_unix: u64,
    ) -> Result<usize, StoreError> {
        let mut inner = self.write_lock();
        let Some(state) = inner.get_mut(&partition) else {
            return Ok(0);
        };

        // Entries still pending in any group survive retention.
        let protected: HashSet<u64> = state
            .groups
            .values()
            .flat_map(|g| g.pending.keys().copied())
            .collect();

        let before = state.log.len();
        state
            .log
            .retain(|e| e.appended_at >= cutoff_unix || protected.contains(&e.offset));
        Ok(before - state.log.len())
    }

    async fn append_dead_letter(&self, record: DlqRecord) -> Result<StreamOffset, StoreError> {
        let mut dlq = match self.dead_letters.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let offset = dlq.len() as u64;
        debug!(message_id = record.message_id(), "dead-lettered message");
        dlq.push(record);
        Ok(StreamOffset(offset))
    }

    async fn dead_letters(&self) -> Result<Vec<DlqRecord>, StoreError> {
        let dlq = match self.dead_letters.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(dlq.clone())
    }

    async fn remove_dead_letter(&self, message_id: &str) -> Result<Option<DlqRecord>, StoreError> {
        let mut dlq = match self.dead_letters.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match dlq.iter().position(|r| r.message_id() == message_id) {
            Some(index) => Ok(Some(dlq.remove(index))),
            None => Ok(None),
        }
    }

    async fn dead_letter_len(&self) -> Result<usize, StoreError> {
        let dlq = match self.dead_letters.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(dlq.len())
    }
}
