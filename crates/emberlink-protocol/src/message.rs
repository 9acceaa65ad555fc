//! The [`Protocol`] trait and its type-erased form, [`AnyProtocol`].
//!
//! Every message that can travel on the wire is a plain Rust struct that
//! implements [`Protocol`]. The trait bounds encode the rules a message
//! type must follow:
//!
//! - `Serialize + DeserializeOwned` → the codec can turn it into a
//!   document and back.
//! - `Default` → decoding starts from an empty instance and fills in
//!   whatever fields the document carries (pair it with
//!   `#[serde(default)]`).
//! - `Send + Sync + 'static` → decoded messages can be handed to
//!   handlers running on any Tokio worker thread.
//!
//! Once decoded, a message's concrete type is only known at runtime, so
//! the session and dispatcher pass around `Box<dyn AnyProtocol>` and
//! recover the concrete type with `downcast`.

use std::any::Any;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A message type that can be registered and sent over the wire.
pub trait Protocol:
    Serialize + DeserializeOwned + Default + fmt::Debug + Send + Sync + 'static
{
    /// The stable wire tag, `"<namespace>.<TypeName>"`.
    const TAG: &'static str;
}

/// Object-safe view of any [`Protocol`] value.
///
/// Implemented automatically for every `Protocol` type.
pub trait AnyProtocol: Any + fmt::Debug + Send + Sync {
    /// The Rust type name, used in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Serializes this message's own fields (without a discriminator).
    fn to_fields(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Borrows the value as `&dyn Any` for runtime type checks.
    fn as_any(&self) -> &dyn Any;

    /// Converts the boxed value into `Box<dyn Any>` for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: Protocol> AnyProtocol for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_fields(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

impl dyn AnyProtocol {
    /// Returns `true` if the boxed message is a `T`.
    pub fn is<T: Protocol>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrows the message as a `T`, if it is one.
    pub fn downcast_ref<T: Protocol>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Takes ownership of the message as a `T`, if it is one.
    pub fn downcast<T: Protocol>(self: Box<Self>) -> Option<T> {
        self.into_any().downcast::<T>().ok().map(|boxed| *boxed)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    impl Protocol for Ping {
        const TAG: &'static str = "Test.Ping";
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Pong {}

    impl Protocol for Pong {
        const TAG: &'static str = "Test.Pong";
    }

    #[test]
    fn test_downcast_ref_matches_concrete_type() {
        let boxed: Box<dyn AnyProtocol> = Box::new(Ping { n: 3 });
        assert!(boxed.is::<Ping>());
        assert!(!boxed.is::<Pong>());
        assert_eq!(boxed.downcast_ref::<Ping>(), Some(&Ping { n: 3 }));
        assert!(boxed.downcast_ref::<Pong>().is_none());
    }

    #[test]
    fn test_downcast_takes_ownership() {
        let boxed: Box<dyn AnyProtocol> = Box::new(Ping { n: 9 });
        assert_eq!(boxed.downcast::<Ping>(), Some(Ping { n: 9 }));

        let boxed: Box<dyn AnyProtocol> = Box::new(Pong {});
        assert!(boxed.downcast::<Ping>().is_none());
    }

    #[test]
    fn test_to_fields_has_no_discriminator() {
        let fields = Ping { n: 1 }.to_fields().unwrap();
        assert_eq!(fields, serde_json::json!({ "n": 1 }));
    }
}
