//! Player manager: the actor host that activates players on demand.

use std::collections::HashMap;
use std::sync::Arc;

use emberlink_session::SessionHandle;
use emberlink_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::player::spawn_player;
use crate::{
    AccountDirectory, LoginOutcome, PlayerConfig, PlayerError, PlayerHandle, PlayerInfo,
    PlayerKey,
};

/// Tracks one actor per player key and routes calls to it.
///
/// A player is activated by the first login or heartbeat addressed to
/// it. If its actor has deactivated in the meantime, the next such call
/// spawns a fresh one. `detach` and `info` never activate a player.
pub struct PlayerManager<A: AccountDirectory> {
    config: PlayerConfig,
    accounts: Arc<A>,
    players: Mutex<HashMap<PlayerKey, PlayerHandle>>,
}

impl<A: AccountDirectory> PlayerManager<A> {
    pub fn new(accounts: A, config: PlayerConfig) -> Self {
        Self {
            config,
            accounts: Arc::new(accounts),
            players: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    /// Returns the live actor for `key`, spawning one if needed.
    pub async fn activate(&self, key: &PlayerKey) -> PlayerHandle {
        let mut players = self.players.lock().await;
        players.retain(|_, handle| handle.is_active());

        if let Some(handle) = players.get(key) {
            return handle.clone();
        }

        let handle = spawn_player(key.clone(), self.config.clone(), Arc::clone(&self.accounts));
        players.insert(key.clone(), handle.clone());
        handle
    }

    /// The live actor for `key`, if there is one.
    pub async fn get(&self, key: &PlayerKey) -> Option<PlayerHandle> {
        self.players
            .lock()
            .await
            .get(key)
            .filter(|handle| handle.is_active())
            .cloned()
    }

    /// Routes a login to `key`'s actor.
    ///
    /// Retries once on a fresh actor if the current one deactivated
    /// before answering.
    pub async fn login(
        &self,
        key: &PlayerKey,
        session: SessionHandle,
    ) -> Result<LoginOutcome, PlayerError> {
        match self.activate(key).await.login(session.clone()).await {
            Err(PlayerError::Unavailable(_)) => {
                tracing::debug!(player = %key, "actor went away during login, retrying");
                self.activate(key).await.login(session).await
            }
            result => result,
        }
    }

    /// Routes a heartbeat to `key`'s actor, with the same retry as
    /// [`login`](Self::login).
    pub async fn heartbeat(
        &self,
        key: &PlayerKey,
        session: SessionHandle,
    ) -> Result<bool, PlayerError> {
        match self.activate(key).await.heartbeat(session.clone()).await {
            Err(PlayerError::Unavailable(_)) => {
                tracing::debug!(player = %key, "actor went away during heartbeat, retrying");
                self.activate(key).await.heartbeat(session).await
            }
            result => result,
        }
    }

    /// Unsubscribes `connection` from `key`'s actor if it is running.
    pub async fn detach(&self, key: &PlayerKey, connection: ConnectionId) -> Result<bool, PlayerError> {
        match self.get(key).await {
            Some(handle) => handle.detach(connection).await,
            None => Ok(false),
        }
    }

    /// Snapshot of `key`'s actor, if it is running.
    pub async fn info(&self, key: &PlayerKey) -> Option<PlayerInfo> {
        self.get(key).await?.info().await.ok()
    }

    /// Number of running actors.
    pub async fn active_count(&self) -> usize {
        self.players
            .lock()
            .await
            .values()
            .filter(|handle| handle.is_active())
            .count()
    }

    /// Deactivates every actor.
    pub async fn shutdown_all(&self) {
        let players: Vec<PlayerHandle> = self.players.lock().await.drain().map(|(_, h)| h).collect();
        tracing::info!(count = players.len(), "shutting down players");
        for handle in players {
            let _ = handle.shutdown().await;
        }
    }
}
