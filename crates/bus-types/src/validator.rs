//! # Wire Validator
//!
//! Gate between raw caller input and the bus. Rejects on the first
//! violation with the failing field path; nothing malformed is ever
//! appended, retried or dead-lettered.

use crate::errors::InvalidMessageError;
use crate::message::{AgentId, Message, Priority, Recipients, Topic};
use serde_json::Value;

/// Required field paths checked before full decoding.
const REQUIRED: &[&str] = &[
    "message_id",
    "routing.from",
    "routing.to",
    "routing.topic",
    "payload.priority",
    "metadata.idempotency_key",
];

/// Validates a raw JSON document and decodes it into a [`Message`].
pub fn validate_json(raw: &str) -> Result<Message, InvalidMessageError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| InvalidMessageError::new("$", format!("not valid JSON: {e}")))?;
    validate_value(&value)
}

/// Validates a parsed JSON value and decodes it into a [`Message`].
pub fn validate_value(value: &Value) -> Result<Message, InvalidMessageError> {
    for path in REQUIRED {
        if lookup(value, path).is_none() {
            return Err(InvalidMessageError::new(*path, "required field is missing"));
        }
    }

    let message: Message = serde_json::from_value(value.clone())
        .map_err(|e| InvalidMessageError::new("$", format!("schema mismatch: {e}")))?;

    validate_message(&message)?;
    Ok(message)
}

/// Semantic checks on an already-decoded message.
///
/// Applied on every publish, including messages built programmatically,
/// so the typed constructors and the wire path enforce the same rules.
pub fn validate_message(message: &Message) -> Result<(), InvalidMessageError> {
    if message.message_id.is_empty() {
        return Err(InvalidMessageError::new("message_id", "must not be empty"));
    }

    check_agent_id(&message.routing.from, "routing.from")?;
    match &message.routing.to {
        Recipients::Broadcast => {}
        Recipients::Agents(agents) => {
            if agents.is_empty() {
                return Err(InvalidMessageError::new(
                    "routing.to",
                    "recipient list must not be empty",
                ));
            }
            for agent in agents {
                check_agent_id(agent, "routing.to")?;
            }
        }
    }

    check_topic(&message.routing.topic, "routing.topic")?;
    if let Some(reply_to) = &message.routing.reply_to {
        check_topic(reply_to, "routing.reply_to")?;
    }

    if !Priority::in_range(message.payload.priority.level()) {
        return Err(InvalidMessageError::new(
            "payload.priority",
            format!("{} is outside 1..=5", message.payload.priority.level()),
        ));
    }

    if message.metadata.idempotency_key.is_empty() {
        return Err(InvalidMessageError::new(
            "metadata.idempotency_key",
            "must not be empty",
        ));
    }

    Ok(())
}

fn check_agent_id(agent: &AgentId, field: &str) -> Result<(), InvalidMessageError> {
    if AgentId::is_valid_name(agent.as_str()) {
        Ok(())
    } else {
        Err(InvalidMessageError::new(
            field,
            format!("'{agent}' does not match [a-z0-9-]+"),
        ))
    }
}

fn check_topic(topic: &Topic, field: &str) -> Result<(), InvalidMessageError> {
    if topic.as_str().is_empty() || topic.segments().any(str::is_empty) {
        Err(InvalidMessageError::new(
            field,
            "topic must be non-empty dot-separated segments",
        ))
    } else {
        Ok(())
    }
}

/// Resolves a dotted path against a JSON value.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}
