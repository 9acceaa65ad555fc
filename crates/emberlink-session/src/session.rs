//! The per-connection protocol session.
//!
//! A [`ProtocolSession`] owns one connection and does two jobs:
//!
//! - **Receive loop** ([`run`](ProtocolSession::run)): reads frames,
//!   reassembles them into whole documents, decodes each one and hands
//!   it to the [`Dispatcher`]. Exactly one message is in flight at a
//!   time: message N+1 is not decoded until handler N has returned.
//! - **Send** ([`send`](ProtocolSession::send)): encodes a message into
//!   the write buffer and writes it as one terminated frame.
//!
//! Bad input never ends the loop. Unknown tags, malformed documents,
//! oversized messages and failing handlers are logged and skipped. The
//! loop ends only when the peer closes, the transport fails, or someone
//! calls [`close`](ProtocolSession::close).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emberlink_protocol::{AnyProtocol, Codec};
use emberlink_transport::{Connection, ConnectionId};
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, watch};

use crate::{Dispatcher, ProtocolSink, SessionConfig, SessionError, SessionHandle};

/// One connection plus its read/write state.
pub struct ProtocolSession<C: Connection> {
    connection: C,
    codec: Arc<dyn Codec>,
    config: SessionConfig,
    /// Reused for every outgoing document. Holding the lock for the whole
    /// encode + write keeps concurrent senders from interleaving.
    write_buffer: Mutex<Vec<u8>>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl<C: Connection> ProtocolSession<C> {
    pub fn new(
        connection: C,
        codec: Arc<dyn Codec>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            connection,
            codec,
            config,
            write_buffer: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            shutdown,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// A cloneable handle that sends through this session.
    pub fn handle(self: &Arc<Self>) -> SessionHandle {
        SessionHandle::new(Arc::clone(self) as Arc<dyn ProtocolSink>)
    }

    /// `false` once the session was closed or the connection dropped.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connection.is_open()
    }

    /// Encodes `message` and writes it as one terminated frame.
    ///
    /// Returns after the transport has finished the write.
    pub async fn send(&self, message: &dyn AnyProtocol) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }

        let mut buffer = self.write_buffer.lock().await;
        buffer.clear();
        self.codec.encode_into(message, &mut buffer)?;
        self.connection
            .send(&buffer)
            .await
            .map_err(SessionError::transport)?;

        tracing::trace!(
            conn_id = %self.id(),
            message_type = message.type_name(),
            bytes = buffer.len(),
            "message sent"
        );
        Ok(())
    }

    /// Closes the session and its connection.
    ///
    /// Wakes a receive loop that is blocked on a read. Closing twice is a
    /// no-op; later sends fail with [`SessionError::Closed`].
    pub async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown.send_replace(true);
        self.connection.close().await.map_err(SessionError::transport)
    }

    /// Runs the receive loop until the connection ends.
    ///
    /// Returns `Ok(())` when the peer closes cleanly or the session is
    /// closed locally, and `Err(SessionError::Transport)` when a read
    /// fails.
    pub async fn run(self: Arc<Self>, dispatcher: Arc<Dispatcher>) -> Result<(), SessionError> {
        let conn_id = self.id();
        let handle = self.handle();
        let mut shutdown = self.shutdown.subscribe();
        let mut read_buffer: Vec<u8> = Vec::new();
        // Set while skipping the remaining frames of an oversized message.
        let mut discarding = false;

        tracing::debug!(%conn_id, "receive loop started");

        loop {
            if self.closed.load(Ordering::SeqCst) {
                tracing::debug!(%conn_id, "session closed locally");
                return Ok(());
            }

            let received = tokio::select! {
                _ = shutdown.changed() => continue,
                received = self.connection.recv() => received,
            };

            let frame = match received {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!(%conn_id, "connection closed by peer");
                    return Ok(());
                }
                Err(e) if self.closed.load(Ordering::SeqCst) => {
                    tracing::debug!(%conn_id, error = %e, "read ended by local close");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(%conn_id, error = %e, "transport fault, ending receive loop");
                    return Err(SessionError::transport(e));
                }
            };

            if discarding {
                discarding = !frame.end_of_message;
                continue;
            }

            if read_buffer.len() + frame.data.len() > self.config.max_message_size {
                tracing::warn!(
                    %conn_id,
                    limit = self.config.max_message_size,
                    "message exceeds size limit, dropping it"
                );
                read_buffer.clear();
                discarding = !frame.end_of_message;
                continue;
            }

            read_buffer.extend_from_slice(&frame.data);
            if !frame.end_of_message {
                continue;
            }

            if read_buffer.is_empty() {
                tracing::trace!(%conn_id, "empty message discarded");
                continue;
            }

            self.process(&handle, &dispatcher, &read_buffer).await;
            read_buffer.clear();
        }
    }

    /// Decodes one complete document and dispatches it.
    async fn process(&self, handle: &SessionHandle, dispatcher: &Dispatcher, document: &[u8]) {
        let conn_id = self.id();

        let message = match self.codec.decode(document) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "rejected incoming document");
                return;
            }
        };

        tracing::trace!(%conn_id, message_type = message.type_name(), "dispatching");

        if let Err(e) = dispatcher.dispatch(handle, message).await {
            tracing::warn!(%conn_id, error = %e, "handler failed");
        }
    }
}

impl<C: Connection> ProtocolSink for ProtocolSession<C> {
    fn connection_id(&self) -> ConnectionId {
        self.id()
    }

    fn send_message<'a>(
        &'a self,
        message: &'a dyn AnyProtocol,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(self.send(message))
    }

    fn close(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(ProtocolSession::close(self))
    }

    fn is_open(&self) -> bool {
        ProtocolSession::is_open(self)
    }
}
