//! Unified error type for Emberlink.

use emberlink_player::PlayerError;
use emberlink_protocol::ProtocolError;
use emberlink_session::{DispatchError, SessionError};
use emberlink_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Each variant converts with `?` from the matching sub-crate error.
#[derive(Debug, thiserror::Error)]
pub enum EmberlinkError {
    /// Bind, accept, connect, or a read/write on a connection.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Registry construction, encode, or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The receive loop or a send on a session.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Handler registration or a failing handler.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A player actor could not be reached.
    #[error(transparent)]
    Player(#[from] PlayerError),
}
