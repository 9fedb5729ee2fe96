//! # Dead Letter Records
//!
//! Terminal record for a message that exhausted its retry budget. Created
//! only by the delivery manager; immutable afterwards except for operator
//! replay or delete actions.

use crate::message::{unix_now, Message};
use serde::{Deserialize, Serialize};

/// One failed delivery attempt in a record's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAttempt {
    /// Attempt number, starting at 1 for the original delivery.
    pub attempt: u32,
    /// Consumer- or store-reported failure description.
    pub error: String,
    /// Unix timestamp of the failure.
    pub timestamp: u64,
}

/// A dead-lettered message with its full failure history.
///
/// A message that exhausted `max_retries` produces exactly one record
/// carrying `max_retries + 1` history entries (the original attempt plus
/// each retry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqRecord {
    /// The message as last published (highest retry_count copy).
    pub original_message: Message,
    /// All failed attempts, oldest first.
    pub failure_history: Vec<FailureAttempt>,
    /// Unix timestamp of the first failure.
    pub first_failed_at: u64,
    /// Unix timestamp of the final failure.
    pub last_failed_at: u64,
}

impl DlqRecord {
    /// Builds a record from a message and its accumulated failures.
    #[must_use]
    pub fn new(original_message: Message, failure_history: Vec<FailureAttempt>) -> Self {
        let now = unix_now();
        let first_failed_at = failure_history.first().map_or(now, |a| a.timestamp);
        let last_failed_at = failure_history.last().map_or(now, |a| a.timestamp);
        Self {
            original_message,
            failure_history,
            first_failed_at,
            last_failed_at,
        }
    }

    /// Id of the dead-lettered message.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.original_message.message_id
    }
}
