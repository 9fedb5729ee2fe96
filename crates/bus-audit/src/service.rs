//! # Audit Trail Service
//!
//! Background task that drains the core's event channel into the audit
//! sink. Batches writes (size or interval, whichever comes first) to
//! bound write amplification. Best-effort end to end: a full channel or
//! an unavailable sink costs audit rows, never message delivery, and
//! every lost row is counted as a gap for later reconciliation.

use crate::event::AuditEvent;
use crate::sink::AuditSink;
use bus_core::BusEvent;
use bus_types::{message::unix_now, BusConfig, StoreError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Default)]
struct AuditStats {
    recorded: AtomicU64,
    gaps: AtomicU64,
}

/// Handle to the running audit task.
pub struct AuditTrail {
    handle: JoinHandle<()>,
    stats: Arc<AuditStats>,
    sink: Arc<dyn AuditSink>,
    retention_days: u32,
}

impl AuditTrail {
    /// Spawns the audit loop over the core's event receiver.
    ///
    /// The task runs until the sending side (the bus) is dropped, then
    /// flushes whatever is buffered and exits.
    #[must_use]
    pub fn spawn(
        mut rx: mpsc::Receiver<BusEvent>,
        sink: Arc<dyn AuditSink>,
        config: &BusConfig,
    ) -> Self {
        let stats = Arc::new(AuditStats::default());
        let task_stats = stats.clone();
        let task_sink = sink.clone();
        let batch_size = config.audit_batch_size.max(1);
        let flush_interval = config.audit_flush_interval;

        let handle = tokio::spawn(async move {
            let sink = task_sink;
            let mut batch: Vec<AuditEvent> = Vec::with_capacity(batch_size);
            let mut tick = tokio::time::interval(flush_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(event) => {
                            batch.push(AuditEvent::from(event));
                            if batch.len() >= batch_size {
                                flush(&sink, &mut batch, &task_stats).await;
                            }
                        }
                        None => {
                            flush(&sink, &mut batch, &task_stats).await;
                            debug!("audit channel closed; audit trail stopping");
                            break;
                        }
                    },
                    _ = tick.tick() => {
                        if !batch.is_empty() {
                            flush(&sink, &mut batch, &task_stats).await;
                        }
                    }
                }
            }
        });

        Self {
            handle,
            stats,
            sink,
            retention_days: config.audit_retention_days,
        }
    }

    /// Enforces the audit store's retention window.
    ///
    /// Returns the number of rows dropped. The window is the configured
    /// `audit_retention_days`, independent of (and normally much longer
    /// than) the message store's retention. Intended to run as a periodic
    /// background task alongside the message-store pass.
    pub async fn run_retention(&self) -> Result<usize, StoreError> {
        let cutoff = unix_now().saturating_sub(u64::from(self.retention_days) * 86_400);
        self.sink.trim_older_than(cutoff).await
    }

    /// Rows durably handed to the sink.
    #[must_use]
    pub fn recorded(&self) -> u64 {
        self.stats.recorded.load(Ordering::Relaxed)
    }

    /// Rows lost to sink unavailability, recorded for reconciliation.
    #[must_use]
    pub fn gaps(&self) -> u64 {
        self.stats.gaps.load(Ordering::Relaxed)
    }

    /// Waits for the task to drain and exit. Call after dropping the bus
    /// (which closes the channel) during shutdown.
    pub async fn shutdown(self) {
        // The task ends on channel close; a join error means it panicked.
        if let Err(e) = self.handle.await {
            warn!(%e, "audit task terminated abnormally");
        }
    }
}

async fn flush(sink: &Arc<dyn AuditSink>, batch: &mut Vec<AuditEvent>, stats: &AuditStats) {
    if batch.is_empty() {
        return;
    }
    let events = std::mem::take(batch);
    let count = events.len() as u64;
    match sink.append_batch(events).await {
        Ok(()) => {
            stats.recorded.fetch_add(count, Ordering::Relaxed);
        }
        Err(e) => {
            // Dropped, not retried: the audit path must never back-pressure
            // delivery. The gap counter is the reconciliation signal.
            stats.gaps.fetch_add(count, Ordering::Relaxed);
            warn!(%e, lost = count, "audit sink unavailable; recorded gap");
        }
    }
}
