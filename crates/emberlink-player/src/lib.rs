//! Player actors and subscriber fan-out for Emberlink.
//!
//! A *player* is the logical entity behind one account. Several
//! connections may reach the same player (a reconnect, a second tab), and
//! the player may push messages to all of them without any of them
//! asking.
//!
//! - [`SubscriberRegistry`]: who is listening, and until when.
//! - [`PlayerHandle`] / player actor: login and heartbeat state machine,
//!   one turn at a time, plus the periodic heartbeat push.
//! - [`PlayerManager`]: activates actors on demand and replaces ones that
//!   idled out.
//! - [`AccountDirectory`]: how logins are recognized.

mod account;
mod config;
mod error;
mod manager;
mod player;
mod subscribers;

pub use account::{AccountDirectory, StaticAccounts};
pub use config::{AuthState, PlayerConfig};
pub use error::PlayerError;
pub use manager::PlayerManager;
pub use player::{LoginOutcome, PlayerHandle, PlayerInfo, PlayerKey, PlayerSubscribers};
pub use subscribers::SubscriberRegistry;
