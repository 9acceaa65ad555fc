//! Player configuration and authentication state.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// PlayerConfig
// ---------------------------------------------------------------------------

/// Timing and capacity settings shared by every player actor.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// How long a subscribed connection stays live without renewing.
    pub subscription_ttl: Duration,

    /// Period of the server-initiated heartbeat push.
    pub push_interval: Duration,

    /// A player with no login or heartbeat for this long is deactivated.
    pub idle_timeout: Duration,

    /// Idle window for a player nobody has logged in as yet, including
    /// one whose login was just rejected.
    pub anonymous_idle_timeout: Duration,

    /// Longest wait for one subscriber's push before it is skipped.
    pub push_timeout: Duration,

    /// Capacity of each actor's command channel. Callers wait when full.
    pub mailbox_size: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            subscription_ttl: Duration::from_secs(30),
            push_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(10 * 60),
            anonymous_idle_timeout: Duration::from_secs(10),
            push_timeout: Duration::from_secs(5),
            mailbox_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthState
// ---------------------------------------------------------------------------

/// Where a player is in the login flow.
///
/// ```text
/// Anonymous ──(recognized login)──→ Authenticated
/// ```
///
/// The transition is one-way. A player leaves `Authenticated` only by
/// being deactivated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated { name: String },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The display name, once authenticated.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { name } => Some(name),
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Authenticated { name } => write!(f, "authenticated as {name}"),
        }
    }
}
