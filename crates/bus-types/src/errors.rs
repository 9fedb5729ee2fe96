//! # Error Taxonomy
//!
//! All error types that cross crate boundaries in the bus, in one place.
//!
//! The tiering used by the delivery manager is derived from these types:
//!
//! - **Tier 1 (never retried)**: [`InvalidMessageError`], [`SecurityError`].
//!   These are caller bugs and surface synchronously to the publisher.
//! - **Tier 2 (retried with backoff)**: [`StoreError::Unavailable`],
//!   [`DeliveryError`]. Transient; the delivery manager owns the retry loop.
//! - **Tier 3 (dead-lettered)**: a Tier 2 failure whose retry budget is spent.

use thiserror::Error;

/// Schema or pattern violation detected before a message enters the bus.
///
/// Carries the path of the first failing field (e.g. `routing.from`,
/// `payload.priority`). Never retried and never dead-lettered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid message: {field}: {reason}")]
pub struct InvalidMessageError {
    /// Dotted path of the failing field.
    pub field: String,
    /// Human-readable reason for the rejection.
    pub reason: String,
}

impl InvalidMessageError {
    /// Creates an error for a specific field path.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Signature verification failure.
///
/// Logged as a security event (target `security`), distinct from the
/// ordinary audit trail. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityError {
    /// The message carries no signature but the bus requires one.
    #[error("message {message_id} is not signed")]
    MissingSignature {
        /// Id of the unsigned message.
        message_id: String,
    },

    /// The MAC did not match the message contents.
    #[error("signature verification failed for message {message_id}")]
    MacMismatch {
        /// Id of the message that failed verification.
        message_id: String,
    },
}

/// Errors from the partition store adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transient backend failure. Callers retry with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The consumer group was never registered on this partition.
    ///
    /// Groups must exist before messages are appended; see the broadcast
    /// delivery policy in `bus-store`.
    #[error("unknown consumer group '{group}' on partition '{partition}'")]
    UnknownGroup {
        /// Partition name.
        partition: String,
        /// Group name.
        group: String,
    },

    /// The partition name is outside the configured set.
    #[error("unknown partition '{0}'")]
    UnknownPartition(String),
}

/// Consumer-reported processing failure for a delivered message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("delivery of message {message_id} failed: {reason}")]
pub struct DeliveryError {
    /// Id of the message whose processing failed.
    pub message_id: String,
    /// Consumer-supplied failure description.
    pub reason: String,
}

impl DeliveryError {
    /// Creates a processing failure report.
    pub fn new(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            reason: reason.into(),
        }
    }
}

/// Union of all bus-facing errors, returned by the core's public operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Schema/validation failure (Tier 1).
    #[error(transparent)]
    Invalid(#[from] InvalidMessageError),

    /// Signature failure (Tier 1).
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Store failure (Tier 2 when transient).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Consumer-reported processing failure (Tier 2, then Tier 3).
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl BusError {
    /// Returns true if the delivery manager may retry this failure.
    ///
    /// Validation and security failures are terminal by design; only
    /// transient store errors and processing failures enter the retry path.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            BusError::Invalid(_) | BusError::Security(_) => false,
            BusError::Store(e) => matches!(e, StoreError::Unavailable(_)),
            BusError::Delivery(_) => true,
        }
    }
}
