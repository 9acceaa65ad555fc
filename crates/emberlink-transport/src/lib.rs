//! Transport abstraction layer for Emberlink.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! a single reliable, ordered, text-capable bidirectional connection.
//!
//! A connection hands the layer above it raw [`Frame`]s. One logical
//! message may arrive split across several frames; it is complete when a
//! frame carries `end_of_message`. Reassembly is the caller's job.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::MemoryConnection;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One physical frame read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The bytes carried by this frame. May be empty.
    pub data: Vec<u8>,
    /// `true` if this frame terminates the current logical message.
    pub end_of_message: bool,
}

impl Frame {
    /// A frame that completes a logical message.
    pub fn last(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            end_of_message: true,
        }
    }

    /// A frame that continues a logical message.
    pub fn partial(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            end_of_message: false,
        }
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive text documents.
///
/// Methods return `Send` futures so a connection can be driven from
/// spawned Tokio tasks. Reads and writes may run concurrently from
/// different tasks.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends `data` to the remote peer as a single terminated text frame
    /// and waits for the write to complete.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns `false` once the connection has been closed by either side.
    fn is_open(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
