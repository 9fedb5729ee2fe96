//! Cross-crate integration tests.

pub mod audit_trail;
pub mod failure_paths;
pub mod scheduling;

use bus_core::MessageBus;
use bus_store::InMemoryPartitionStore;
use bus_types::{AgentId, BusConfig, Message, Priority, Recipients, Topic};
use std::sync::Arc;

/// Bus over a fresh in-memory store with test timings.
pub fn test_bus() -> (Arc<MessageBus>, Arc<InMemoryPartitionStore>) {
    let store = Arc::new(InMemoryPartitionStore::new());
    let bus = Arc::new(MessageBus::new(store.clone(), BusConfig::for_testing()));
    (bus, store)
}

/// A message from agent-a to agent-b on the given topic and priority.
pub fn test_message(topic: &str, priority: u8) -> Message {
    Message::new(
        AgentId::parse("agent-a").expect("valid fixture agent id"),
        Recipients::single(AgentId::parse("agent-b").expect("valid fixture agent id")),
        Topic::parse(topic).expect("valid fixture topic"),
        Priority::new(priority).expect("valid fixture priority"),
    )
}
