//! `EmberlinkServer` builder and server loop.
//!
//! This is the entry point for running an Emberlink server. It ties
//! together all the layers: transport → protocol → session → player.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use emberlink_player::{AccountDirectory, PlayerConfig, PlayerManager};
use emberlink_protocol::{C2SClientLogin, C2SHeartbeat, Codec, JsonCodec, messages};
use emberlink_session::{Dispatcher, SessionConfig};
use emberlink_transport::{Transport, WebSocketTransport};

use crate::handler::{ClientLoginHandler, HeartbeatHandler, handle_connection};
use crate::{ConnectionBindings, EmberlinkError};

/// Address the builder binds to unless told otherwise.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8763";

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<A: AccountDirectory> {
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) players: Arc<PlayerManager<A>>,
    pub(crate) bindings: Arc<ConnectionBindings>,
    pub(crate) session_config: SessionConfig,
}

impl<A: AccountDirectory> ServerState<A> {
    /// Wires the codec, the players, and the two server handlers.
    pub(crate) fn new(
        accounts: A,
        session_config: SessionConfig,
        player_config: PlayerConfig,
    ) -> Result<Self, EmberlinkError> {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec::new(Arc::new(messages::registry()?)));
        let players = Arc::new(PlayerManager::new(accounts, player_config));
        let bindings = Arc::new(ConnectionBindings::new());

        let dispatcher = Dispatcher::builder()
            .on::<C2SClientLogin, _>(ClientLoginHandler::new(
                Arc::clone(&players),
                Arc::clone(&bindings),
            ))
            .on::<C2SHeartbeat, _>(HeartbeatHandler::new(
                Arc::clone(&players),
                Arc::clone(&bindings),
            ))
            .build()?;

        Ok(Self {
            codec,
            dispatcher: Arc::new(dispatcher),
            players,
            bindings,
            session_config,
        })
    }
}

/// Builder for configuring and starting an Emberlink server.
///
/// # Example
///
/// ```rust,ignore
/// use emberlink::prelude::*;
///
/// let server = EmberlinkServerBuilder::new()
///     .bind("0.0.0.0:8763")
///     .build(StaticAccounts::reference())
///     .await?;
/// server.run().await
/// ```
pub struct EmberlinkServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    player_config: PlayerConfig,
}

impl EmberlinkServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session_config: SessionConfig::default(),
            player_config: PlayerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the per-connection session limits.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the player timings.
    pub fn player_config(mut self, config: PlayerConfig) -> Self {
        self.player_config = config;
        self
    }

    /// Binds the listener and wires the server around `accounts`.
    pub async fn build<A: AccountDirectory>(
        self,
        accounts: A,
    ) -> Result<EmberlinkServer<A>, EmberlinkError> {
        let state = Arc::new(ServerState::new(
            accounts,
            self.session_config,
            self.player_config,
        )?);
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        Ok(EmberlinkServer { transport, state })
    }
}

impl Default for EmberlinkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Emberlink server, created by [`EmberlinkServerBuilder::build`].
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct EmberlinkServer<A: AccountDirectory> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A>>,
}

impl<A: AccountDirectory> EmberlinkServer<A> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The player manager, for inspecting or shutting down players.
    pub fn players(&self) -> Arc<PlayerManager<A>> {
        Arc::clone(&self.state.players)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), EmberlinkError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then deactivates
    /// every player.
    ///
    /// Connection tasks already spawned keep running until their peers
    /// disconnect.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), EmberlinkError>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "Emberlink server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.state.players.shutdown_all().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use emberlink_player::StaticAccounts;

    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = EmberlinkServerBuilder::default();
        assert_eq!(builder.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(builder.session_config.max_message_size, 1024 * 1024);
    }

    #[test]
    fn test_state_registers_both_handlers() {
        let state = ServerState::new(
            StaticAccounts::reference(),
            SessionConfig::default(),
            PlayerConfig::default(),
        )
        .unwrap();

        assert!(state.dispatcher.handles::<C2SClientLogin>());
        assert!(state.dispatcher.handles::<C2SHeartbeat>());
        assert_eq!(state.dispatcher.len(), 2);
    }

    #[tokio::test]
    async fn test_run_until_returns_on_shutdown() {
        let server = EmberlinkServerBuilder::new()
            .bind("127.0.0.1:0")
            .build(StaticAccounts::reference())
            .await
            .unwrap();
        let players = server.players();

        server.run_until(async {}).await.unwrap();
        assert_eq!(players.active_count().await, 0);
    }
}
