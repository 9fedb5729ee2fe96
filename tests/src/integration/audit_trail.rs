//! # Audit Trail End to End
//!
//! Full wiring: bus core -> event channel -> audit service -> sink.
//! Exercises the best-effort contract: audit loss surfaces as gap counts
//! and never blocks or fails a delivery operation.

#[cfg(test)]
mod tests {
    use crate::integration::test_message;
    use bus_audit::{AuditSink, AuditTrail, MemoryAuditSink};
    use bus_core::{BusEventKind, MessageBus};
    use bus_delivery::DeliveryManager;
    use bus_store::InMemoryPartitionStore;
    use bus_types::BusConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn audited_bus() -> (Arc<MessageBus>, Arc<InMemoryPartitionStore>, AuditTrail, Arc<MemoryAuditSink>) {
        let store = Arc::new(InMemoryPartitionStore::new());
        let (bus, rx) =
            MessageBus::new(store.clone(), BusConfig::for_testing()).with_audit_channel();
        let bus = Arc::new(bus);
        let sink = Arc::new(MemoryAuditSink::new());
        let trail = AuditTrail::spawn(rx, sink.clone(), bus.config());
        (bus, store, trail, sink)
    }

    async fn settle(trail: &AuditTrail, expect_rows: u64) {
        for _ in 0..50 {
            if trail.recorded() + trail.gaps() >= expect_rows {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_lifecycle_recorded_in_order() {
        let (bus, _, trail, sink) = audited_bus();
        bus.register_group("workers").await.unwrap();

        bus.publish(test_message("jobs.encode", 3)).await.unwrap();
        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        bus.acknowledge(batch[0].priority(), "workers", &batch[0].message_id)
            .await
            .unwrap();

        settle(&trail, 3).await;
        let rows = sink.events().await.unwrap();
        let kinds: Vec<BusEventKind> = rows.iter().map(|r| r.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                BusEventKind::Published,
                BusEventKind::Delivered,
                BusEventKind::Acknowledged,
            ]
        );
        assert!(rows.iter().all(|r| r.message_id == batch[0].message_id));
    }

    #[tokio::test]
    async fn test_dead_letter_event_reaches_trail() {
        let (bus, store, trail, sink) = audited_bus();
        let manager = DeliveryManager::new(bus.clone(), store);
        bus.register_group("workers").await.unwrap();

        bus.publish(test_message("jobs.encode", 3).with_max_retries(0))
            .await
            .unwrap();
        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        let failure = bus_types::BusError::from(bus_types::DeliveryError::new(
            &batch[0].message_id,
            "handler error",
        ));
        manager
            .report_failure("workers", &batch[0], failure)
            .await
            .unwrap();

        // Published, Delivered, DeadLettered, Acknowledged (escalation
        // acks the failed delivery after the DLQ append).
        settle(&trail, 4).await;
        let rows = sink.events().await.unwrap();
        assert!(rows
            .iter()
            .any(|r| r.event_type == BusEventKind::DeadLettered));
    }

    /// Delivery keeps working while the sink is down, and every lost row
    /// shows up as a gap.
    #[tokio::test]
    async fn test_sink_outage_never_blocks_delivery() {
        let (bus, _, trail, sink) = audited_bus();
        bus.register_group("workers").await.unwrap();

        sink.set_unavailable(true);
        for i in 0..5 {
            bus.publish(test_message(&format!("jobs.n{i}"), 3))
                .await
                .unwrap();
        }
        let batch = bus.subscribe("workers", "w-1", 10, None).await.unwrap();
        assert_eq!(batch.len(), 5, "delivery unaffected by audit outage");

        settle(&trail, 10).await;
        assert!(trail.gaps() >= 10, "publishes and deliveries lost as gaps");
        assert_eq!(trail.recorded(), 0);

        sink.set_unavailable(false);
        bus.publish(test_message("jobs.after", 3)).await.unwrap();
        settle(&trail, trail.gaps() + 1).await;
        assert!(trail.recorded() >= 1, "trail resumes after recovery");
    }

    #[tokio::test]
    async fn test_audit_rows_redact_payload() {
        let (bus, _, trail, sink) = audited_bus();

        let message = test_message("jobs.encode", 3)
            .with_subject("Encode batch 7")
            .with_action("encode")
            .with_body("api_key=sk-secret-value");
        bus.publish(message).await.unwrap();

        settle(&trail, 1).await;
        let rows = sink.events().await.unwrap();
        assert_eq!(rows[0].payload_summary, "Encode batch 7 [encode]");
        assert!(
            !format!("{rows:?}").contains("sk-secret-value"),
            "body and data must never reach the audit store"
        );
    }

    #[tokio::test]
    async fn test_graceful_shutdown_drains_channel() {
        let store = Arc::new(InMemoryPartitionStore::new());
        let mut config = BusConfig::for_testing();
        config.audit_flush_interval = Duration::from_secs(3600);
        config.audit_batch_size = 1000;

        let (bus, rx) = MessageBus::new(store, config).with_audit_channel();
        let sink = Arc::new(MemoryAuditSink::new());
        let trail = AuditTrail::spawn(rx, sink.clone(), bus.config());

        for i in 0..3 {
            bus.publish(test_message(&format!("jobs.n{i}"), 2))
                .await
                .unwrap();
        }
        drop(bus);
        trail.shutdown().await;
        assert_eq!(sink.events().await.unwrap().len(), 3);
    }
}
