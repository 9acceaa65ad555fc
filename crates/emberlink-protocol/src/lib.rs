//! Wire protocol for Emberlink.
//!
//! This crate defines the language that clients and servers speak:
//!
//! - **Messages** ([`Protocol`], [`AnyProtocol`], the [`messages`]
//!   catalog): plain structs, each with a stable wire tag.
//! - **Registry** ([`TypeRegistry`]): the immutable tag ↔ type table,
//!   built once at startup from an explicit list.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how messages become documents
//!   and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames of bytes) and
//! session (dispatch to handlers). It knows nothing about connections
//! or players.
//!
//! ```text
//! Transport (frames) → Protocol (Box<dyn AnyProtocol>) → Session (handlers)
//! ```

mod codec;
mod error;
mod message;
pub mod messages;
mod registry;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{AnyProtocol, Protocol};
pub use messages::{
    C2SClientLogin, C2SHeartbeat, LoginError, S2CClientLogin, S2CHeartbeat,
};
pub use registry::{TypeRegistry, TypeRegistryBuilder};
