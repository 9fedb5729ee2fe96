//! # Scheduling and Delivery Guarantees
//!
//! Priority ordering across partitions, at-least-once recovery through the
//! claim protocol, idempotent acknowledgment and broadcast fan-out.

#[cfg(test)]
mod tests {
    use crate::integration::{test_bus, test_message};
    use bus_types::{AgentId, Message, Priority, Recipients, Topic};
    use std::time::Duration;

    /// An alert at priority 5 published after a log line at priority 1
    /// is still delivered first.
    #[tokio::test]
    async fn test_priority_five_always_beats_priority_one() {
        let (bus, _) = test_bus();
        bus.register_group("workers").await.unwrap();

        bus.publish(test_message("log.line", 1)).await.unwrap();
        bus.publish(test_message("alert.fire", 5)).await.unwrap();

        let first = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].routing.topic.as_str(), "alert.fire");

        let second = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        assert_eq!(second[0].routing.topic.as_str(), "log.line");
    }

    #[tokio::test]
    async fn test_full_descending_drain_order() {
        let (bus, _) = test_bus();
        bus.register_group("workers").await.unwrap();

        // Publish in shuffled priority order.
        for priority in [2u8, 5, 1, 4, 3] {
            bus.publish(test_message(&format!("t.p{priority}"), priority))
                .await
                .unwrap();
        }

        let batch = bus.subscribe("workers", "w-1", 10, None).await.unwrap();
        let levels: Vec<u8> = batch.iter().map(|m| m.priority().level()).collect();
        assert_eq!(levels, vec![5, 4, 3, 2, 1]);
    }

    /// Kill-and-reclaim: a consumer that reads and dies without acking
    /// loses nothing; another instance recovers the message via claim.
    #[tokio::test]
    async fn test_at_least_once_after_consumer_crash() {
        let (bus, _) = test_bus();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("jobs.encode", 3)).await.unwrap();

        let read = bus.subscribe("workers", "w-crashed", 1, None).await.unwrap();
        assert_eq!(read.len(), 1);
        let lost_id = read[0].message_id.clone();
        // w-crashed dies here: no ack ever arrives.

        tokio::time::sleep(bus.config().claim_idle_threshold * 2).await;

        let recovered = bus.claim_stale("workers", "w-2").await.unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].message_id, lost_id);

        // The recovering instance completes the delivery.
        bus.acknowledge(recovered[0].priority(), "workers", &lost_id)
            .await
            .unwrap();
        let pending = bus
            .pending(Priority::new(3).unwrap(), "workers")
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_double_acknowledge_is_harmless() {
        let (bus, _) = test_bus();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("jobs.a", 2)).await.unwrap();

        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        let id = batch[0].message_id.clone();
        let priority = batch[0].priority();

        assert!(bus.acknowledge(priority, "workers", &id).await.is_ok());
        assert!(bus.acknowledge(priority, "workers", &id).await.is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_registered_group() {
        let (bus, _) = test_bus();
        bus.register_group("vision").await.unwrap();
        bus.register_group("audio").await.unwrap();
        bus.register_group("archive").await.unwrap();

        bus.broadcast(test_message("announce.model-update", 4))
            .await
            .unwrap();

        for group in ["vision", "audio", "archive"] {
            let batch = bus.subscribe(group, "c-1", 10, None).await.unwrap();
            assert_eq!(batch.len(), 1, "group {group} must read the broadcast once");
        }
    }

    /// The documented broadcast policy: no retroactive delivery. A group
    /// registered after the publish never sees it.
    #[tokio::test]
    async fn test_late_group_misses_earlier_broadcast() {
        let (bus, _) = test_bus();
        bus.register_group("early").await.unwrap();

        bus.broadcast(test_message("announce.reload", 3))
            .await
            .unwrap();
        bus.register_group("late").await.unwrap();

        assert_eq!(
            bus.subscribe("early", "e-1", 10, None).await.unwrap().len(),
            1
        );
        assert!(bus.subscribe("late", "l-1", 10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wire_json_publish_and_delivery() {
        let (bus, _) = test_bus();
        bus.register_group("workers").await.unwrap();

        let raw = r#"{
            "message_id": "msg-wire-1",
            "routing": {"from": "agent-a", "to": ["agent-b"], "topic": "vision.review.complete",
                        "correlation_id": "req-1"},
            "payload": {"subject": "Review done", "body": "...", "action": "review_complete",
                        "priority": 4, "data": {}},
            "metadata": {"ttl": 86400, "retry_count": 0, "max_retries": 3,
                         "idempotency_key": "k1", "tags": []},
            "audit": {"sender_version": "1.0", "sender_instance_id": "a-1",
                      "trace_id": "t1", "span_id": "s1"}
        }"#;
        bus.publish_json(raw).await.unwrap();

        let batch = bus.subscribe("workers", "w-1", 1, None).await.unwrap();
        assert_eq!(batch[0].message_id, "msg-wire-1");
        assert_eq!(batch[0].routing.correlation_id.as_deref(), Some("req-1"));
    }

    /// Reply flow: replies are ordinary messages correlated by id, not
    /// blocking calls.
    #[tokio::test]
    async fn test_reply_correlated_by_id() {
        let (bus, _) = test_bus();
        bus.register_group("agent-a").await.unwrap();
        bus.register_group("agent-b").await.unwrap();

        let request = test_message("work.request", 3)
            .with_reply_to(Topic::parse("work.reply").unwrap());
        let request_id = request.message_id.clone();
        bus.publish(request).await.unwrap();

        let received = bus.subscribe("agent-b", "b-1", 1, None).await.unwrap();
        let reply = Message::new(
            AgentId::parse("agent-b").unwrap(),
            Recipients::single(AgentId::parse("agent-a").unwrap()),
            received[0].routing.reply_to.clone().unwrap(),
            Priority::new(3).unwrap(),
        )
        .with_correlation_id(&request_id);
        bus.publish(reply).await.unwrap();

        // agent-b's read must be skipped; agent-a's group sees both the
        // request (it is registered on all partitions) and the reply.
        let for_a = bus.subscribe("agent-a", "a-1", 10, None).await.unwrap();
        let correlated: Vec<_> = for_a
            .iter()
            .filter(|m| m.routing.correlation_id.as_deref() == Some(request_id.as_str()))
            .collect();
        assert_eq!(correlated.len(), 1);
        assert_eq!(correlated[0].routing.topic.as_str(), "work.reply");
    }

    #[tokio::test]
    async fn test_deadline_expiry_returns_empty_not_error() {
        let (bus, _) = test_bus();
        bus.register_group("workers").await.unwrap();
        bus.publish(test_message("jobs.a", 3)).await.unwrap();

        let batch = bus
            .subscribe("workers", "w-1", 10, Some(Duration::ZERO))
            .await
            .unwrap();
        assert!(batch.is_empty());
    }
}
