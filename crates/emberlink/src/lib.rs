//! # Emberlink
//!
//! Typed, self-describing messages over WebSocket, with per-player
//! subscriber fan-out.
//!
//! A client logs in with an account name. The server answers, subscribes
//! the connection to that account's player, and from then on pushes a
//! heartbeat to it every few seconds. The client keeps the subscription
//! alive by heartbeating back; a connection that goes quiet simply
//! expires.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emberlink::prelude::*;
//!
//! # async fn serve() -> Result<(), EmberlinkError> {
//! let server = EmberlinkServerBuilder::new()
//!     .bind("127.0.0.1:8763")
//!     .build(StaticAccounts::reference())
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! On the client side, register a [`HeartbeatResponder`] and send a login:
//!
//! ```rust,no_run
//! use emberlink::prelude::*;
//!
//! # async fn connect() -> Result<(), EmberlinkError> {
//! let dispatcher = Dispatcher::builder()
//!     .on::<S2CHeartbeat, _>(HeartbeatResponder)
//!     .build()?;
//! let client = EmberlinkClient::connect("ws://127.0.0.1:8763", dispatcher).await?;
//! client.send(&C2SClientLogin { account: "overing".into() }).await?;
//! # Ok(())
//! # }
//! ```

mod bindings;
mod client;
mod error;
mod handler;
mod logging;
mod server;

pub use bindings::ConnectionBindings;
pub use client::{EmberlinkClient, HeartbeatResponder};
pub use error::EmberlinkError;
pub use handler::{ClientLoginHandler, HeartbeatHandler};
pub use logging::init_tracing;
pub use server::{DEFAULT_BIND_ADDR, EmberlinkServer, EmberlinkServerBuilder};

pub use emberlink_player as player;
pub use emberlink_protocol as protocol;
pub use emberlink_session as session;
pub use emberlink_transport as transport;

/// Common imports for building servers and clients.
pub mod prelude {
    pub use crate::{
        EmberlinkClient, EmberlinkError, EmberlinkServer, EmberlinkServerBuilder,
        HeartbeatResponder, init_tracing,
    };
    pub use emberlink_player::{AccountDirectory, PlayerConfig, PlayerKey, StaticAccounts};
    pub use emberlink_protocol::{
        AnyProtocol, C2SClientLogin, C2SHeartbeat, LoginError, Protocol, S2CClientLogin,
        S2CHeartbeat,
    };
    pub use emberlink_session::{
        Dispatcher, HandlerError, ProtocolHandler, SessionConfig, SessionHandle,
    };
}
