//! Which player each connection has logged in as.

use std::collections::HashMap;

use emberlink_player::PlayerKey;
use emberlink_transport::ConnectionId;
use tokio::sync::Mutex;

/// Connection → player index, filled in by a successful login.
///
/// Heartbeats carry no account, so the server looks up the player here.
#[derive(Debug, Default)]
pub struct ConnectionBindings {
    bound: Mutex<HashMap<ConnectionId, PlayerKey>>,
}

impl ConnectionBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `connection` to `key`, returning the previous binding.
    pub async fn bind(&self, connection: ConnectionId, key: PlayerKey) -> Option<PlayerKey> {
        self.bound.lock().await.insert(connection, key)
    }

    pub async fn lookup(&self, connection: ConnectionId) -> Option<PlayerKey> {
        self.bound.lock().await.get(&connection).cloned()
    }

    pub async fn unbind(&self, connection: ConnectionId) -> Option<PlayerKey> {
        self.bound.lock().await.remove(&connection)
    }

    pub async fn len(&self) -> usize {
        self.bound.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bound.lock().await.is_empty()
    }
}
