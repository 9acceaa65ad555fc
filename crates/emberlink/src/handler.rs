//! Server-side message handlers and the per-connection task.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]:
//!   1. Wrap the connection in a `ProtocolSession`.
//!   2. Run its receive loop against the server dispatcher.
//!   3. On exit, close the session and settle the connection's
//!      subscription: a clean close detaches it at once, a transport
//!      fault leaves it to expire.

use std::sync::Arc;

use emberlink_player::{AccountDirectory, LoginOutcome, PlayerKey, PlayerManager};
use emberlink_protocol::{C2SClientLogin, C2SHeartbeat, LoginError, S2CClientLogin};
use emberlink_session::{HandlerError, ProtocolHandler, ProtocolSession, SessionHandle};
use emberlink_transport::{Connection, ConnectionId};

use crate::server::ServerState;
use crate::{ConnectionBindings, EmberlinkError};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Answers `C2S_ClientLogin` with `S2C_ClientLogin`.
///
/// On success the connection is bound to the player and subscribed to
/// its pushes.
pub struct ClientLoginHandler<A: AccountDirectory> {
    players: Arc<PlayerManager<A>>,
    bindings: Arc<ConnectionBindings>,
}

impl<A: AccountDirectory> ClientLoginHandler<A> {
    pub fn new(players: Arc<PlayerManager<A>>, bindings: Arc<ConnectionBindings>) -> Self {
        Self { players, bindings }
    }
}

impl<A: AccountDirectory> ProtocolHandler<C2SClientLogin> for ClientLoginHandler<A> {
    async fn handle(
        &self,
        session: &SessionHandle,
        message: C2SClientLogin,
    ) -> Result<(), HandlerError> {
        let conn_id = session.id();
        let key = PlayerKey::new(message.account);

        let reply = match self.players.login(&key, session.clone()).await? {
            LoginOutcome::Accepted { name } => {
                if let Some(previous) = self.bindings.bind(conn_id, key.clone()).await {
                    if previous != key {
                        // Logged in as someone else on the same connection.
                        self.players.detach(&previous, conn_id).await?;
                    }
                }
                S2CClientLogin::accepted(name)
            }
            LoginOutcome::Rejected => S2CClientLogin::rejected(LoginError::AccountNotFound),
        };

        session.send(&reply).await?;
        Ok(())
    }
}

/// Renews the subscription of a logged-in connection on `C2S_Heartbeat`.
///
/// A heartbeat from a connection that never logged in is ignored.
pub struct HeartbeatHandler<A: AccountDirectory> {
    players: Arc<PlayerManager<A>>,
    bindings: Arc<ConnectionBindings>,
}

impl<A: AccountDirectory> HeartbeatHandler<A> {
    pub fn new(players: Arc<PlayerManager<A>>, bindings: Arc<ConnectionBindings>) -> Self {
        Self { players, bindings }
    }
}

impl<A: AccountDirectory> ProtocolHandler<C2SHeartbeat> for HeartbeatHandler<A> {
    async fn handle(
        &self,
        session: &SessionHandle,
        _message: C2SHeartbeat,
    ) -> Result<(), HandlerError> {
        let conn_id = session.id();
        let Some(key) = self.bindings.lookup(conn_id).await else {
            tracing::debug!(%conn_id, "heartbeat on unbound connection, ignoring");
            return Ok(());
        };

        if !self.players.heartbeat(&key, session.clone()).await? {
            tracing::debug!(%conn_id, player = %key, "heartbeat for a player that is not logged in");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

/// Removes the connection's binding when the task exits.
///
/// `Drop` is synchronous, so the async removal runs on a spawned task.
struct BindingGuard {
    conn_id: ConnectionId,
    bindings: Arc<ConnectionBindings>,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let bindings = Arc::clone(&self.bindings);
        tokio::spawn(async move {
            bindings.unbind(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, A>(
    conn: C,
    state: Arc<ServerState<A>>,
) -> Result<(), EmberlinkError>
where
    C: Connection,
    A: AccountDirectory,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let session = ProtocolSession::new(
        conn,
        Arc::clone(&state.codec),
        state.session_config.clone(),
    );
    let _guard = BindingGuard {
        conn_id,
        bindings: Arc::clone(&state.bindings),
    };

    let result = Arc::clone(&session).run(Arc::clone(&state.dispatcher)).await;

    if let Err(e) = session.close().await {
        tracing::debug!(%conn_id, error = %e, "close after receive loop failed");
    }

    match result {
        Ok(()) => {
            if let Some(key) = state.bindings.unbind(conn_id).await {
                state.players.detach(&key, conn_id).await?;
            }
            tracing::info!(%conn_id, "connection closed");
            Ok(())
        }
        Err(e) => {
            // The subscription, if any, is left to run out its TTL.
            tracing::info!(%conn_id, error = %e, "connection lost");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use emberlink_player::{PlayerConfig, StaticAccounts};
    use emberlink_protocol::{Codec, S2CClientLogin};
    use emberlink_session::SessionConfig;
    use emberlink_transport::memory;

    use super::*;

    fn state() -> Arc<ServerState<StaticAccounts>> {
        Arc::new(
            ServerState::new(
                StaticAccounts::reference(),
                SessionConfig::default(),
                PlayerConfig::default(),
            )
            .unwrap(),
        )
    }

    async fn login_reply(client: &memory::MemoryConnection, codec: &dyn Codec) -> S2CClientLogin {
        let frame = client.recv().await.unwrap().unwrap();
        codec
            .decode(&frame.data)
            .unwrap()
            .downcast::<S2CClientLogin>()
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_close_detaches_subscription() {
        let state = state();
        let (server, client) = memory::pair();
        let task = tokio::spawn(handle_connection(server, Arc::clone(&state)));

        client
            .send(br#"{"$protocol-type":"GameCore.C2S_ClientLogin","Account":"overing"}"#)
            .await
            .unwrap();
        let reply = login_reply(&client, state.codec.as_ref()).await;
        assert!(reply.is_accepted());

        let key = PlayerKey::from("overing");
        assert_eq!(state.players.info(&key).await.unwrap().subscribers, 1);

        client.close().await.unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(state.players.info(&key).await.unwrap().subscribers, 0);
        assert!(state.bindings.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejected_login_is_not_bound() {
        let state = state();
        let (server, client) = memory::pair();
        let _task = tokio::spawn(handle_connection(server, Arc::clone(&state)));

        client
            .send(br#"{"$protocol-type":"GameCore.C2S_ClientLogin","Account":"someone_else"}"#)
            .await
            .unwrap();
        let reply = login_reply(&client, state.codec.as_ref()).await;

        assert_eq!(reply, S2CClientLogin::rejected(LoginError::AccountNotFound));
        assert!(state.bindings.is_empty().await);
    }

    #[tokio::test]
    async fn test_heartbeat_on_unbound_connection_does_not_activate() {
        let state = state();
        let (server, client) = memory::pair();
        let _task = tokio::spawn(handle_connection(server, Arc::clone(&state)));

        client
            .send(br#"{"$protocol-type":"GameCore.C2S_Heartbeat"}"#)
            .await
            .unwrap();
        // Round-trip a login so the heartbeat has certainly been handled.
        client
            .send(br#"{"$protocol-type":"GameCore.C2S_ClientLogin","Account":"someone_else"}"#)
            .await
            .unwrap();
        login_reply(&client, state.codec.as_ref()).await;

        assert!(state.players.info(&PlayerKey::from("overing")).await.is_none());
    }
}
