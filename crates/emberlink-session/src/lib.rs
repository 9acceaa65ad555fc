//! Per-connection protocol sessions for Emberlink.
//!
//! This crate turns a raw [`Connection`](emberlink_transport::Connection)
//! into a typed message channel:
//!
//! 1. **Framing** ([`ProtocolSession`]): reassembles frames into whole
//!    documents, decodes them, and writes outgoing messages.
//! 2. **Dispatch** ([`Dispatcher`], [`ProtocolHandler`]): routes each
//!    decoded message to the single handler registered for its type.
//! 3. **Handles** ([`SessionHandle`]): cheap, cloneable references that
//!    let handlers and actors push messages back to a connection.
//!
//! # How it fits in the stack
//!
//! ```text
//! Player layer (above)    ← holds SessionHandles as subscribers
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below)  ← Codec, AnyProtocol
//!     ↕
//! Transport layer         ← Connection, Frame
//! ```

mod config;
mod dispatch;
mod error;
mod handle;
mod session;

pub use config::SessionConfig;
pub use dispatch::{Dispatcher, DispatcherBuilder, ProtocolHandler};
pub use error::{DispatchError, HandlerError, SessionError};
pub use handle::{ProtocolSink, SessionHandle};
pub use session::ProtocolSession;
