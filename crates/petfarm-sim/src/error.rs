//! Error types for the petfarm-sim crate.
//!
//! Rule checks never panic; a failed check returns a [`Rejection`] carrying
//! the typed reason sent back to the client and a human-readable message.

use petfarm_types::RejectionReason;

/// A player action that failed validation.
///
/// Produced before any mutation, so callers can drop their working copies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("action rejected ({reason:?}): {message}")]
pub struct Rejection {
    /// Typed reason returned to the client.
    pub reason: RejectionReason,
    /// Description of what failed.
    pub message: String,
}

impl Rejection {
    /// Build a rejection.
    pub fn new(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}
