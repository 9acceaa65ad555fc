//! Error types for the player layer.

use crate::PlayerKey;

/// Errors that can occur when talking to a player actor.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The actor has deactivated (or is deactivating) and dropped the
    /// request. The manager retries once on a fresh actor.
    #[error("player {0} is unavailable")]
    Unavailable(PlayerKey),
}
