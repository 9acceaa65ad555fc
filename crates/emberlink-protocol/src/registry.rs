//! The type registry: a two-way map between wire tags and Rust types.
//!
//! The registry is built once at startup from an explicit list of message
//! types and never changes afterwards. Both directions are injective:
//! a tag names exactly one type, and a type has exactly one tag.
//!
//! ```rust
//! use emberlink_protocol::{C2SHeartbeat, S2CHeartbeat, TypeRegistry};
//!
//! let registry = TypeRegistry::builder()
//!     .register::<C2SHeartbeat>()
//!     .register::<S2CHeartbeat>()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(registry.tag_for::<C2SHeartbeat>(), Some("GameCore.C2S_Heartbeat"));
//! assert!(registry.contains_tag("GameCore.S2C_Heartbeat"));
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::{AnyProtocol, Protocol, ProtocolError};

/// Builds a boxed message of one concrete type from its fields.
type DecodeFn =
    fn(serde_json::Value) -> Result<Box<dyn AnyProtocol>, serde_json::Error>;

fn decode_as<P: Protocol>(
    fields: serde_json::Value,
) -> Result<Box<dyn AnyProtocol>, serde_json::Error> {
    let message: P = serde_json::from_value(fields)?;
    Ok(Box::new(message))
}

struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    tag: &'static str,
    decode: DecodeFn,
}

/// Immutable tag ↔ type lookup table.
pub struct TypeRegistry {
    by_tag: HashMap<&'static str, Registration>,
    by_type: HashMap<TypeId, &'static str>,
}

impl TypeRegistry {
    /// Starts building a registry.
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Returns the tag registered for `P`.
    pub fn tag_for<P: Protocol>(&self) -> Option<&'static str> {
        self.by_type.get(&TypeId::of::<P>()).copied()
    }

    /// Returns the tag registered for the runtime type of `message`.
    pub fn tag_of(&self, message: &dyn AnyProtocol) -> Option<&'static str> {
        self.by_type.get(&message.as_any().type_id()).copied()
    }

    /// Returns `true` if `tag` names a registered type.
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// All registered tags, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.by_tag.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// Decodes `fields` into the type registered under `tag`.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownMessageType`] if `tag` is not registered.
    /// - [`ProtocolError::MalformedMessage`] if the fields don't fit the type.
    pub fn decode(
        &self,
        tag: &str,
        fields: serde_json::Value,
    ) -> Result<Box<dyn AnyProtocol>, ProtocolError> {
        let registration = self
            .by_tag
            .get(tag)
            .ok_or_else(|| ProtocolError::UnknownMessageType(tag.to_string()))?;
        (registration.decode)(fields).map_err(|e| {
            ProtocolError::MalformedMessage(format!("{tag}: {e}"))
        })
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

/// Collects registrations; [`build`](Self::build) validates them.
#[derive(Default)]
pub struct TypeRegistryBuilder {
    registrations: Vec<Registration>,
}

impl TypeRegistryBuilder {
    /// Adds `P` under its [`Protocol::TAG`].
    pub fn register<P: Protocol>(mut self) -> Self {
        self.registrations.push(Registration {
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            tag: P::TAG,
            decode: decode_as::<P>,
        });
        self
    }

    /// Freezes the registrations into a [`TypeRegistry`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::DuplicateRegistration`] if a tag or a type
    /// appears twice.
    pub fn build(self) -> Result<TypeRegistry, ProtocolError> {
        let mut by_tag = HashMap::with_capacity(self.registrations.len());
        let mut by_type = HashMap::with_capacity(self.registrations.len());

        for registration in self.registrations {
            if by_type.insert(registration.type_id, registration.tag).is_some() {
                return Err(ProtocolError::DuplicateRegistration(
                    registration.type_name.to_string(),
                ));
            }
            let tag = registration.tag;
            if by_tag.insert(tag, registration).is_some() {
                return Err(ProtocolError::DuplicateRegistration(
                    tag.to_string(),
                ));
            }
        }

        Ok(TypeRegistry { by_tag, by_type })
    }
}
