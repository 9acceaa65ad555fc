//! Cloneable, type-erased references to a session.
//!
//! Handlers and player actors need to push messages back to a connection
//! without knowing which transport sits underneath. They hold a
//! [`SessionHandle`]: a cheap clone of an `Arc<dyn ProtocolSink>`.

use std::fmt;
use std::sync::Arc;

use emberlink_protocol::AnyProtocol;
use emberlink_transport::ConnectionId;
use futures_util::future::BoxFuture;

use crate::SessionError;

/// Object-safe outbound half of a session.
///
/// [`ProtocolSession`](crate::ProtocolSession) implements this for every
/// connection type. Tests can implement it directly to record what would
/// have been sent.
pub trait ProtocolSink: Send + Sync + 'static {
    fn connection_id(&self) -> ConnectionId;

    /// Encodes `message` and writes it as one terminated frame.
    fn send_message<'a>(
        &'a self,
        message: &'a dyn AnyProtocol,
    ) -> BoxFuture<'a, Result<(), SessionError>>;

    /// Closes the session. Closing twice is a no-op.
    fn close(&self) -> BoxFuture<'_, Result<(), SessionError>>;

    fn is_open(&self) -> bool;
}

/// A subscriber handle: lets its holder send to one connection.
#[derive(Clone)]
pub struct SessionHandle {
    sink: Arc<dyn ProtocolSink>,
}

impl SessionHandle {
    pub fn new(sink: Arc<dyn ProtocolSink>) -> Self {
        Self { sink }
    }

    /// The connection this handle writes to.
    pub fn id(&self) -> ConnectionId {
        self.sink.connection_id()
    }

    /// Sends a message and waits for the write to complete.
    ///
    /// # Errors
    /// - [`SessionError::Closed`] if the session was closed.
    /// - [`SessionError::Protocol`] if the message's type is not registered.
    /// - [`SessionError::Transport`] if the write fails.
    pub async fn send(&self, message: &dyn AnyProtocol) -> Result<(), SessionError> {
        self.sink.send_message(message).await
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        self.sink.close().await
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_open()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionHandle").field(&self.id()).finish()
    }
}
