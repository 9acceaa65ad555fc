//! Error types for the session layer.

use std::error::Error;

use emberlink_protocol::ProtocolError;

/// What a [`ProtocolHandler`](crate::ProtocolHandler) returns when it fails.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Errors raised while routing a decoded message.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The handler for `tag` ran and failed.
    #[error("handler for {tag} failed: {source}")]
    Handler {
        tag: &'static str,
        #[source]
        source: HandlerError,
    },

    /// A message reached the handler slot of a different type.
    /// Only possible if the dispatcher's index is corrupted.
    #[error("message routed to the handler for {0} has a different type")]
    TypeMismatch(&'static str),

    /// Two handlers were registered for the same message type.
    #[error("duplicate handler for {0}")]
    DuplicateHandler(&'static str),
}

/// Errors that can occur on a protocol session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The underlying connection failed to read or write.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),

    /// Encoding an outgoing message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The session was closed; nothing more can be sent.
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    pub(crate) fn transport<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Transport(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_keeps_source() {
        let err = DispatchError::Handler {
            tag: "GameCore.C2S_Heartbeat",
            source: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "handler for GameCore.C2S_Heartbeat failed: boom"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_protocol_error_converts() {
        let err: SessionError =
            ProtocolError::UnregisteredMessageType("Foo").into();
        assert!(matches!(err, SessionError::Protocol(_)));
        assert_eq!(err.to_string(), "message type Foo is not registered");
    }
}
