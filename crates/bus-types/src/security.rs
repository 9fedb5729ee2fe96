//! # Message Signing
//!
//! HMAC-SHA256 MAC over the immutable identity of a message. The MAC
//! covers `message_id`, `routing.from`, `routing.topic` and the payload,
//! so a retry copy (which only bumps `retry_count`) stays verifiable.
//!
//! Verification failures are Tier 1: surfaced synchronously, never
//! retried, and logged under the `security` target so they can be
//! separated from the ordinary audit stream.

use crate::errors::SecurityError;
use crate::message::Message;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Shared secret used to MAC messages.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Computes the MAC for a message's signed fields.
    #[must_use]
    pub fn mac(&self, message: &Message) -> [u8; 32] {
        self.mac_state(message).finalize().into_bytes().into()
    }

    fn mac_state(&self, message: &Message) -> HmacSha256 {
        // Key length is unrestricted for HMAC; new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC accepts any key length");
        mac.update(message.message_id.as_bytes());
        mac.update(b"\x00");
        mac.update(message.routing.from.as_str().as_bytes());
        mac.update(b"\x00");
        mac.update(message.routing.topic.as_str().as_bytes());
        mac.update(b"\x00");
        // Payload is hashed via its canonical JSON encoding.
        if let Ok(payload) = serde_json::to_vec(&message.payload) {
            mac.update(&payload);
        }
        mac
    }

    /// Signs a message in place, setting `audit.signature`.
    pub fn sign(&self, message: &mut Message) {
        let mac = self.mac(message);
        message.audit.signature = Some(mac);
    }

    /// Verifies a message's MAC.
    ///
    /// # Errors
    ///
    /// - [`SecurityError::MissingSignature`] if the message is unsigned.
    /// - [`SecurityError::MacMismatch`] if the MAC does not match.
    pub fn verify(&self, message: &Message) -> Result<(), SecurityError> {
        let Some(signature) = &message.audit.signature else {
            warn!(
                target: "security",
                message_id = %message.message_id,
                from = %message.routing.from,
                "rejected unsigned message"
            );
            return Err(SecurityError::MissingSignature {
                message_id: message.message_id.clone(),
            });
        };

        // Constant-time comparison via the hmac crate.
        if self.mac_state(message).verify_slice(signature).is_err() {
            warn!(
                target: "security",
                message_id = %message.message_id,
                from = %message.routing.from,
                "signature verification failed"
            );
            return Err(SecurityError::MacMismatch {
                message_id: message.message_id.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("SigningKey(..)")
    }
}
