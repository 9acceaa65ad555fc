//! Player actor: one Tokio task per logical player.
//!
//! The actor owns the player's auth state, its subscriber table, and the
//! heartbeat push loop. The outside world talks to it only through a
//! bounded command channel, so calls into one player run one at a time
//! (a "turn") while different players run concurrently.
//!
//! ```text
//!   connection A ─┐                       ┌─ push loop (every push_interval)
//!   connection B ─┼─→ PlayerHandle ─→ mpsc ─→ PlayerActor ─→ SubscriberRegistry
//!   manager      ─┘                       └─ idle deadline → deactivate
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use emberlink_protocol::S2CHeartbeat;
use emberlink_session::SessionHandle;
use emberlink_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{AccountDirectory, AuthState, PlayerConfig, PlayerError, SubscriberRegistry};

/// Subscribers of one player, keyed by the connection they write to.
pub type PlayerSubscribers = SubscriberRegistry<ConnectionId, SessionHandle>;

/// Stable identity of a logical player: the account it logs in as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerKey(String);

impl PlayerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PlayerKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Result of a login turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The account is known; the connection is now subscribed.
    Accepted { name: String },
    /// The account is unknown; nothing changed.
    Rejected,
}

/// A snapshot of a player actor's state.
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub key: PlayerKey,
    pub state: AuthState,
    /// Live subscriber count.
    pub subscribers: usize,
    pub push_loop_running: bool,
}

pub(crate) enum PlayerCommand {
    Login {
        session: SessionHandle,
        reply: oneshot::Sender<LoginOutcome>,
    },
    Heartbeat {
        session: SessionHandle,
        reply: oneshot::Sender<bool>,
    },
    Detach {
        connection: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    Info {
        reply: oneshot::Sender<PlayerInfo>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// PlayerHandle
// ---------------------------------------------------------------------------

/// Handle to a running player actor. Cheap to clone.
#[derive(Clone)]
pub struct PlayerHandle {
    key: PlayerKey,
    sender: mpsc::Sender<PlayerCommand>,
}

impl PlayerHandle {
    pub fn key(&self) -> &PlayerKey {
        &self.key
    }

    /// `false` once the actor has started deactivating.
    pub fn is_active(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Logs `session` in. On success the connection becomes a subscriber
    /// and the push loop is started if it isn't running.
    pub async fn login(&self, session: SessionHandle) -> Result<LoginOutcome, PlayerError> {
        self.request(|reply| PlayerCommand::Login { session, reply }).await
    }

    /// Renews `session`'s subscription and the idle deadline.
    ///
    /// Returns `false` (and does nothing) if the player is not logged in.
    pub async fn heartbeat(&self, session: SessionHandle) -> Result<bool, PlayerError> {
        self.request(|reply| PlayerCommand::Heartbeat { session, reply }).await
    }

    /// Unsubscribes one connection. Returns `true` if it was subscribed.
    pub async fn detach(&self, connection: ConnectionId) -> Result<bool, PlayerError> {
        self.request(|reply| PlayerCommand::Detach { connection, reply }).await
    }

    pub async fn info(&self) -> Result<PlayerInfo, PlayerError> {
        self.request(|reply| PlayerCommand::Info { reply }).await
    }

    /// Asks the actor to deactivate now.
    pub async fn shutdown(&self) -> Result<(), PlayerError> {
        self.sender
            .send(PlayerCommand::Shutdown)
            .await
            .map_err(|_| PlayerError::Unavailable(self.key.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> Result<T, PlayerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| PlayerError::Unavailable(self.key.clone()))?;
        reply_rx
            .await
            .map_err(|_| PlayerError::Unavailable(self.key.clone()))
    }
}

impl fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PlayerActor
// ---------------------------------------------------------------------------

struct PlayerActor<A: AccountDirectory> {
    key: PlayerKey,
    state: AuthState,
    config: PlayerConfig,
    accounts: Arc<A>,
    subscribers: Arc<PlayerSubscribers>,
    push_loop: Option<JoinHandle<()>>,
    deadline: Instant,
    receiver: mpsc::Receiver<PlayerCommand>,
}

impl<A: AccountDirectory> PlayerActor<A> {
    async fn run(mut self) {
        tracing::info!(player = %self.key, "player activated");

        loop {
            let command = tokio::select! {
                command = self.receiver.recv() => command,
                () = tokio::time::sleep_until(self.deadline) => {
                    tracing::info!(player = %self.key, "idle timeout reached");
                    break;
                }
            };

            let Some(command) = command else { break };

            match command {
                PlayerCommand::Login { session, reply } => {
                    let outcome = self.handle_login(session).await;
                    self.touch();
                    let _ = reply.send(outcome);
                }
                PlayerCommand::Heartbeat { session, reply } => {
                    let renewed = self.handle_heartbeat(session).await;
                    if renewed {
                        self.touch();
                    }
                    let _ = reply.send(renewed);
                }
                PlayerCommand::Detach { connection, reply } => {
                    let removed = self.subscribers.unsubscribe(&connection).await;
                    if removed {
                        tracing::debug!(player = %self.key, conn_id = %connection, "connection detached");
                    }
                    let _ = reply.send(removed);
                }
                PlayerCommand::Info { reply } => {
                    let _ = reply.send(self.info().await);
                }
                PlayerCommand::Shutdown => break,
            }
        }

        self.deactivate();
    }

    /// Pushes the idle deadline out by a full window, or by the short
    /// anonymous window while nobody has logged in.
    fn touch(&mut self) {
        self.deadline = Instant::now() + idle_window(&self.config, &self.state);
    }

    async fn handle_login(&mut self, session: SessionHandle) -> LoginOutcome {
        let Some(name) = self.accounts.lookup(self.key.as_str()).await else {
            tracing::info!(player = %self.key, conn_id = %session.id(), "login rejected: account not found");
            return LoginOutcome::Rejected;
        };

        self.state = AuthState::Authenticated { name: name.clone() };
        self.subscribers.subscribe(session.id(), session.clone()).await;
        self.ensure_push_loop();

        tracing::info!(player = %self.key, conn_id = %session.id(), %name, "login accepted");
        LoginOutcome::Accepted { name }
    }

    async fn handle_heartbeat(&mut self, session: SessionHandle) -> bool {
        if !self.state.is_authenticated() {
            tracing::debug!(player = %self.key, conn_id = %session.id(), "heartbeat before login, ignoring");
            return false;
        }
        let conn_id = session.id();
        if self.subscribers.subscribe(conn_id, session).await {
            tracing::debug!(player = %self.key, %conn_id, "connection attached by heartbeat");
        }
        true
    }

    fn ensure_push_loop(&mut self) {
        if self.push_loop.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let task = tokio::spawn(push_loop(
            self.key.clone(),
            Arc::clone(&self.subscribers),
            self.config.push_interval,
        ));
        self.push_loop = Some(task);
    }

    async fn info(&self) -> PlayerInfo {
        PlayerInfo {
            key: self.key.clone(),
            state: self.state.clone(),
            subscribers: self.subscribers.len().await,
            push_loop_running: self
                .push_loop
                .as_ref()
                .is_some_and(|task| !task.is_finished()),
        }
    }

    /// Stops accepting commands, drops the queued ones (their callers see
    /// `Unavailable`) and cancels the push loop.
    fn deactivate(&mut self) {
        self.receiver.close();
        let mut dropped = 0;
        while self.receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if let Some(task) = self.push_loop.take() {
            task.abort();
        }
        tracing::info!(player = %self.key, dropped, "player deactivated");
    }
}

impl<A: AccountDirectory> Drop for PlayerActor<A> {
    fn drop(&mut self) {
        // Covers a panicking turn; `deactivate` has already run otherwise.
        if let Some(task) = self.push_loop.take() {
            task.abort();
        }
    }
}

fn idle_window(config: &PlayerConfig, state: &AuthState) -> Duration {
    if state.is_authenticated() {
        config.idle_timeout
    } else {
        config.anonymous_idle_timeout
    }
}

/// Pushes `S2C_Heartbeat` to every live subscriber once per `period`.
async fn push_loop(key: PlayerKey, subscribers: Arc<PlayerSubscribers>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let delivered = subscribers
            .notify(|session| async move { session.send(&S2CHeartbeat {}).await })
            .await;
        tracing::trace!(player = %key, delivered, "heartbeat pushed");
    }
}

/// Spawns a player actor and returns a handle to it.
pub(crate) fn spawn_player<A: AccountDirectory>(
    key: PlayerKey,
    config: PlayerConfig,
    accounts: Arc<A>,
) -> PlayerHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_size.max(1));

    let actor = PlayerActor {
        key: key.clone(),
        state: AuthState::Anonymous,
        subscribers: Arc::new(
            SubscriberRegistry::new(config.subscription_ttl)
                .with_delivery_timeout(config.push_timeout),
        ),
        deadline: Instant::now() + idle_window(&config, &AuthState::Anonymous),
        config,
        accounts,
        push_loop: None,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    PlayerHandle { key, sender: tx }
}
