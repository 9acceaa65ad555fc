//! Client side of an Emberlink connection.
//!
//! A client is a [`ProtocolSession`] over an outgoing WebSocket with its
//! receive loop running on a background task. Server pushes are routed
//! through the caller's [`Dispatcher`] exactly like requests are on the
//! server.

use std::sync::Arc;

use emberlink_protocol::{AnyProtocol, C2SHeartbeat, Codec, JsonCodec, S2CHeartbeat, messages};
use emberlink_session::{
    Dispatcher, HandlerError, ProtocolHandler, ProtocolSession, SessionConfig, SessionError,
    SessionHandle,
};
use emberlink_transport::WebSocketConnection;
use tokio::task::JoinHandle;

use crate::EmberlinkError;

/// A connected client.
///
/// Dropping the client stops its receive loop without a close handshake.
/// Call [`close`](Self::close) first for a clean shutdown.
pub struct EmberlinkClient {
    session: Arc<ProtocolSession<WebSocketConnection>>,
    receive_loop: Option<JoinHandle<Result<(), SessionError>>>,
}

impl EmberlinkClient {
    /// Connects to `url` with the built-in message set.
    pub async fn connect(url: &str, dispatcher: Dispatcher) -> Result<Self, EmberlinkError> {
        let codec = Arc::new(JsonCodec::new(Arc::new(messages::registry()?)));
        Self::connect_with(url, codec, dispatcher, SessionConfig::default()).await
    }

    /// Connects to `url` with a caller-supplied codec and session limits.
    pub async fn connect_with(
        url: &str,
        codec: Arc<dyn Codec>,
        dispatcher: Dispatcher,
        config: SessionConfig,
    ) -> Result<Self, EmberlinkError> {
        let connection = WebSocketConnection::connect(url).await?;
        let session = ProtocolSession::new(connection, codec, config);
        tracing::debug!(conn_id = %session.id(), url, "client connected");

        let receive_loop = tokio::spawn(Arc::clone(&session).run(Arc::new(dispatcher)));

        Ok(Self {
            session,
            receive_loop: Some(receive_loop),
        })
    }

    /// A cloneable handle for sending from other tasks.
    pub fn handle(&self) -> SessionHandle {
        self.session.handle()
    }

    pub async fn send(&self, message: &dyn AnyProtocol) -> Result<(), SessionError> {
        self.session.send(message).await
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// Closes the connection. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.session.close().await
    }

    /// Waits for the receive loop to finish, returning how it ended.
    pub async fn wait(mut self) -> Result<(), SessionError> {
        match self.receive_loop.take() {
            Some(task) => task.await.map_err(|e| SessionError::Transport(Box::new(e)))?,
            None => Ok(()),
        }
    }
}

impl Drop for EmberlinkClient {
    fn drop(&mut self) {
        if let Some(task) = self.receive_loop.take() {
            task.abort();
        }
    }
}

/// Answers every server `S2C_Heartbeat` push with a `C2S_Heartbeat`,
/// which keeps the client's subscription alive.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeartbeatResponder;

impl ProtocolHandler<S2CHeartbeat> for HeartbeatResponder {
    async fn handle(
        &self,
        session: &SessionHandle,
        _message: S2CHeartbeat,
    ) -> Result<(), HandlerError> {
        session.send(&C2SHeartbeat {}).await?;
        Ok(())
    }
}
