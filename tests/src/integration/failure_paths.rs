//! # Failure Tiers and the Dead Letter Boundary
//!
//! End-to-end retry behavior through the delivery manager: transient
//! failures back off and republish, exhausted budgets escalate to the
//! DLQ, and operator replay puts messages back into circulation.

#[cfg(test)]
mod tests {
    use crate::integration::{test_bus, test_message};
    use bus_core::MessageBus;
    use bus_delivery::{DeliveryManager, FailureOutcome};
    use bus_types::{BusError, DeliveryError, InvalidMessageError, Message, StoreError};
    use std::sync::Arc;

    fn manager_fixture() -> (Arc<MessageBus>, DeliveryManager) {
        let (bus, store) = test_bus();
        let manager = DeliveryManager::new(bus.clone(), store);
        (bus, manager)
    }

    async fn deliver_and_fail(
        bus: &MessageBus,
        manager: &DeliveryManager,
    ) -> (Message, FailureOutcome) {
        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        assert_eq!(batch.len(), 1, "expected a deliverable message");
        let message = batch[0].clone();
        let failure = BusError::from(DeliveryError::new(&message.message_id, "handler error"));
        let outcome = manager
            .report_failure("workers", &message, failure)
            .await
            .unwrap();
        (message, outcome)
    }

    /// Budget of 2: two failures then a success must leave the DLQ empty
    /// and no failure history behind.
    #[tokio::test]
    async fn test_two_failures_then_success_leaves_dlq_empty() {
        let (bus, manager) = manager_fixture();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("jobs.encode", 3).with_max_retries(2))
            .await
            .unwrap();

        let (_, first) = deliver_and_fail(&bus, &manager).await;
        assert!(matches!(first, FailureOutcome::Retried { attempt: 1, .. }));
        let (_, second) = deliver_and_fail(&bus, &manager).await;
        assert!(matches!(second, FailureOutcome::Retried { attempt: 2, .. }));

        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        assert_eq!(batch[0].metadata.retry_count, 2);
        manager.report_success("workers", &batch[0]).await.unwrap();

        assert_eq!(manager.dlq_depth().await.unwrap(), 0);
    }

    /// Budget of 1: the second failure dead-letters with exactly one
    /// record carrying both attempts.
    #[tokio::test]
    async fn test_budget_of_one_dead_letters_on_second_failure() {
        let (bus, manager) = manager_fixture();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("jobs.encode", 3).with_max_retries(1))
            .await
            .unwrap();

        let (_, first) = deliver_and_fail(&bus, &manager).await;
        assert!(matches!(first, FailureOutcome::Retried { attempt: 1, .. }));
        let (original, second) = deliver_and_fail(&bus, &manager).await;
        assert_eq!(second, FailureOutcome::DeadLettered);

        let entries = manager.dlq_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message_id(), original.message_id);
        assert_eq!(entries[0].failure_history.len(), 2);
        assert_eq!(entries[0].failure_history[0].attempt, 1);
        assert_eq!(entries[0].failure_history[1].attempt, 2);

        // The partition is drained: automatic retry has stopped.
        assert!(bus.subscribe("workers", "w-1", 1, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_is_never_retried() {
        let (bus, manager) = manager_fixture();
        bus.register_group("workers").await.unwrap();

        let message = test_message("jobs.encode", 3);
        let failure = BusError::from(InvalidMessageError::new("payload.priority", "out of range"));
        let outcome = manager
            .report_failure("workers", &message, failure)
            .await
            .unwrap();

        assert!(matches!(outcome, FailureOutcome::Rejected(_)));
        assert_eq!(manager.dlq_depth().await.unwrap(), 0);
        assert!(bus.subscribe("workers", "w-1", 1, None).await.unwrap().is_empty());
    }

    /// Store outages are tier 2: the failed delivery is retried through
    /// the same backoff path as a consumer-reported failure.
    #[tokio::test]
    async fn test_store_outage_is_retryable() {
        let (bus, manager) = manager_fixture();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("jobs.encode", 3)).await.unwrap();

        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        let failure = BusError::from(StoreError::Unavailable("connection reset".into()));
        let outcome = manager
            .report_failure("workers", &batch[0], failure)
            .await
            .unwrap();
        assert!(matches!(outcome, FailureOutcome::Retried { attempt: 1, .. }));
    }

    #[tokio::test]
    async fn test_replay_round_trip_back_to_consumer() {
        let (bus, manager) = manager_fixture();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("jobs.encode", 4).with_max_retries(0))
            .await
            .unwrap();

        let (original, outcome) = deliver_and_fail(&bus, &manager).await;
        assert_eq!(outcome, FailureOutcome::DeadLettered);

        manager.replay(&original.message_id).await.unwrap();
        assert_eq!(manager.dlq_depth().await.unwrap(), 0);

        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        assert_eq!(batch[0].message_id, original.message_id);
        assert_eq!(batch[0].metadata.retry_count, 0, "replay resets the counter");
        assert_eq!(batch[0].priority(), original.priority());
    }

    #[tokio::test]
    async fn test_replay_of_unknown_id_is_none() {
        let (_, manager) = manager_fixture();
        assert!(manager.replay("msg-does-not-exist").await.unwrap().is_none());
    }

    /// Retries keep the original priority: a failed priority-5 message
    /// goes back to the front of the line, not behind fresh traffic.
    #[tokio::test]
    async fn test_retry_preserves_priority_position() {
        let (bus, manager) = manager_fixture();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("alert.fire", 5)).await.unwrap();

        let (original, _) = deliver_and_fail(&bus, &manager).await;
        bus.publish(test_message("jobs.batch", 3)).await.unwrap();

        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        assert_eq!(batch[0].message_id, original.message_id);
        assert_eq!(batch[0].priority().level(), 5);
    }
}
