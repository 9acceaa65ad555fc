//! Error types for the protocol layer.
//!
//! Two classes live here. Per-message errors (`UnknownMessageType`,
//! `MalformedMessage`) come from remote input: the receive loop logs them
//! and moves on to the next frame. Consistency errors
//! (`UnregisteredMessageType`, `DuplicateRegistration`) mean the local
//! build is wired wrong and must fail the operation that hit them.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An incoming document named a tag that is not in the registry.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The document is not a valid envelope, or its fields don't match
    /// the type its tag names.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Tried to encode a value whose type was never registered.
    #[error("message type {0} is not registered")]
    UnregisteredMessageType(&'static str),

    /// The serializer rejected a registered message.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Two registrations share a tag or a type.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),
}

impl ProtocolError {
    /// Returns `true` for errors caused by a single bad incoming document.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownMessageType(_) | Self::MalformedMessage(_)
        )
    }
}
