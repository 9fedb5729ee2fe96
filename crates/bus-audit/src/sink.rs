//! # Audit Sink
//!
//! Durable destination for audit batches. The port mirrors the partition
//! store's adapter style; the in-memory implementation is the reference
//! and the test double, including an availability switch for gap tests.

use crate::event::AuditEvent;
use async_trait::async_trait;
use bus_types::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Append-only destination for audit rows.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends a batch atomically.
    async fn append_batch(&self, events: Vec<AuditEvent>) -> Result<(), StoreError>;

    /// All retained rows, oldest first.
    async fn events(&self) -> Result<Vec<AuditEvent>, StoreError>;

    /// Drops rows older than `cutoff_unix` (audit retention enforcement).
    async fn trim_older_than(&self, cutoff_unix: u64) -> Result<usize, StoreError>;
}

/// In-memory [`AuditSink`].
#[derive(Default)]
pub struct MemoryAuditSink {
    rows: RwLock<Vec<AuditEvent>>,
    unavailable: AtomicBool,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles availability. While unavailable every append fails, which
    /// the audit service records as a gap.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append_batch(&self, events: Vec<AuditEvent>) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit sink offline".into()));
        }
        let mut rows = match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rows.extend(events);
        Ok(())
    }

    async fn events(&self) -> Result<Vec<AuditEvent>, StoreError> {
        let rows = match self.rows.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(rows.clone())
    }

    async fn trim_older_than(&self, cutoff_unix: u64) -> Result<usize, StoreError> {
        let mut rows = match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = rows.len();
        rows.retain(|row| row.timestamp >= cutoff_unix);
        Ok(before - rows.len())
    }
}
