//! Codec trait and the JSON envelope codec.
//!
//! A codec converts between messages and the bytes of one wire document.
//! The session layer only needs something that implements [`Codec`], so
//! the envelope format can change without touching framing or dispatch.
//!
//! [`JsonCodec`] writes a flat JSON object: the message's own fields plus
//! one reserved discriminator field naming its tag.
//!
//! ```rust
//! use std::sync::Arc;
//! use emberlink_protocol::{messages, C2SClientLogin, Codec, JsonCodec};
//!
//! let codec = JsonCodec::new(Arc::new(messages::registry().unwrap()));
//!
//! let bytes = codec
//!     .encode(&C2SClientLogin { account: "overing".into() })
//!     .unwrap();
//! let decoded = codec.decode(&bytes).unwrap();
//!
//! assert_eq!(
//!     decoded.downcast_ref::<C2SClientLogin>(),
//!     Some(&C2SClientLogin { account: "overing".into() })
//! );
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::messages::DISCRIMINATOR;
use crate::{AnyProtocol, ProtocolError, TypeRegistry};

/// Encodes messages to documents and decodes documents to messages.
///
/// `Send + Sync + 'static` because one codec is shared by every session
/// on every Tokio worker thread.
pub trait Codec: Send + Sync + 'static {
    /// Appends the encoded document for `message` to `out`.
    ///
    /// # Errors
    /// - [`ProtocolError::UnregisteredMessageType`] if the message's type
    ///   is not in the registry.
    /// - [`ProtocolError::Encode`] if the serializer fails.
    fn encode_into(
        &self,
        message: &dyn AnyProtocol,
        out: &mut Vec<u8>,
    ) -> Result<(), ProtocolError>;

    /// Encodes `message` into a fresh buffer.
    fn encode(&self, message: &dyn AnyProtocol) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        self.encode_into(message, &mut out)?;
        Ok(out)
    }

    /// Decodes one complete document.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedMessage`] if the bytes are not an
    ///   envelope or the fields don't fit the tagged type.
    /// - [`ProtocolError::UnknownMessageType`] if the tag is not registered.
    fn decode(&self, data: &[u8]) -> Result<Box<dyn AnyProtocol>, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that writes flat, tagged JSON objects.
#[derive(Debug, Clone)]
pub struct JsonCodec {
    registry: Arc<TypeRegistry>,
}

impl JsonCodec {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

impl Codec for JsonCodec {
    fn encode_into(
        &self,
        message: &dyn AnyProtocol,
        out: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let tag = self
            .registry
            .tag_of(message)
            .ok_or(ProtocolError::UnregisteredMessageType(message.type_name()))?;

        let mut fields = match message.to_fields().map_err(ProtocolError::Encode)? {
            Value::Object(fields) => fields,
            other => {
                return Err(ProtocolError::Encode(serde::ser::Error::custom(
                    format!("{tag} serialized to {other}, expected an object"),
                )));
            }
        };
        fields.insert(DISCRIMINATOR.to_string(), Value::String(tag.to_string()));

        serde_json::to_writer(out, &fields).map_err(ProtocolError::Encode)
    }

    fn decode(&self, data: &[u8]) -> Result<Box<dyn AnyProtocol>, ProtocolError> {
        let document: Value = serde_json::from_slice(data)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

        let Value::Object(mut fields) = document else {
            return Err(ProtocolError::MalformedMessage(
                "document is not an object".into(),
            ));
        };

        let tag = match fields.remove(DISCRIMINATOR) {
            Some(Value::String(tag)) => tag,
            Some(_) => {
                return Err(ProtocolError::MalformedMessage(format!(
                    "{DISCRIMINATOR} is not a string"
                )));
            }
            None => {
                return Err(ProtocolError::MalformedMessage(format!(
                    "missing {DISCRIMINATOR}"
                )));
            }
        };

        self.registry.decode(&tag, Value::Object(fields))
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::messages::{
        self, C2SClientLogin, C2SHeartbeat, LoginError, S2CClientLogin, S2CHeartbeat,
    };
    use crate::Protocol;

    fn codec() -> JsonCodec {
        JsonCodec::new(Arc::new(messages::registry().unwrap()))
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Unshipped {}

    impl Protocol for Unshipped {
        const TAG: &'static str = "GameCore.Unshipped";
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Scalar(u32);

    impl Protocol for Scalar {
        const TAG: &'static str = "Test.Scalar";
    }

    #[test]
    fn test_encode_flattens_fields_beside_discriminator() {
        let bytes = codec()
            .encode(&S2CClientLogin::accepted("Overing"))
            .unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "$protocol-type": "GameCore.S2C_ClientLogin",
                "Error": 0,
                "Name": "Overing",
            })
        );
    }

    #[test]
    fn test_decode_returns_concrete_type() {
        let decoded = codec()
            .decode(br#"{"$protocol-type":"GameCore.S2C_ClientLogin","Error":1,"Name":""}"#)
            .unwrap();
        assert_eq!(
            decoded.downcast_ref::<S2CClientLogin>(),
            Some(&S2CClientLogin::rejected(LoginError::AccountNotFound))
        );
    }

    #[test]
    fn test_decode_fieldless_message() {
        let decoded = codec()
            .decode(br#"{"$protocol-type":"GameCore.S2C_Heartbeat"}"#)
            .unwrap();
        assert!(decoded.is::<S2CHeartbeat>());
    }

    #[test]
    fn test_decode_is_order_independent() {
        let decoded = codec()
            .decode(br#"{"Account":"overing","$protocol-type":"GameCore.C2S_ClientLogin"}"#)
            .unwrap();
        assert_eq!(
            decoded.downcast::<C2SClientLogin>(),
            Some(C2SClientLogin { account: "overing".into() })
        );
    }

    #[test]
    fn test_encode_unregistered_type_fails() {
        let result = codec().encode(&Unshipped {});
        assert!(matches!(
            result,
            Err(ProtocolError::UnregisteredMessageType(name)) if name.ends_with("Unshipped")
        ));
    }

    #[test]
    fn test_encode_non_object_fields_fails() {
        let registry = TypeRegistry::builder().register::<Scalar>().build().unwrap();
        let codec = JsonCodec::new(Arc::new(registry));
        assert!(matches!(
            codec.encode(&Scalar(3)),
            Err(ProtocolError::Encode(_))
        ));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let result = codec().decode(br#"{"$protocol-type":"GameCore.Nope"}"#);
        assert!(matches!(result, Err(ProtocolError::UnknownMessageType(_))));
    }

    #[test]
    fn test_decode_rejects_bad_envelopes() {
        let codec = codec();
        let docs: [&[u8]; 4] = [
            b"not json",
            br#"[1,2]"#,
            br#"{"Account":"x"}"#,
            br#"{"$protocol-type":5}"#,
        ];
        for doc in docs {
            let result = codec.decode(doc);
            assert!(
                matches!(result, Err(ProtocolError::MalformedMessage(_))),
                "{}",
                String::from_utf8_lossy(doc)
            );
        }
    }

    #[test]
    fn test_decode_bad_fields_is_malformed() {
        let result = codec()
            .decode(br#"{"$protocol-type":"GameCore.C2S_ClientLogin","Account":[]}"#);
        assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));
    }

    #[test]
    fn test_encode_into_appends() {
        let mut out = b"prefix".to_vec();
        codec().encode_into(&S2CHeartbeat {}, &mut out).unwrap();
        assert!(out.starts_with(b"prefix{"));
    }

    /// Encodes then decodes `message`, asserting nothing was lost.
    fn round_trip<P>(codec: &JsonCodec, message: P) -> &'static str
    where
        P: Protocol + PartialEq + Debug + Clone,
    {
        let bytes = codec.encode(&message).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.downcast::<P>(), Some(message));
        P::TAG
    }

    #[test]
    fn test_whole_catalog_round_trips() {
        let codec = codec();
        let mut tags = vec![
            round_trip(&codec, C2SClientLogin { account: "overing".into() }),
            round_trip(&codec, S2CClientLogin::accepted("Overing")),
            round_trip(&codec, S2CClientLogin::rejected(LoginError::AccountNotFound)),
            round_trip(&codec, C2SHeartbeat {}),
            round_trip(&codec, S2CHeartbeat {}),
        ];
        tags.sort_unstable();
        tags.dedup();

        assert_eq!(tags, codec.registry().tags());
    }

    #[test]
    fn test_decode_null_strings_as_empty() {
        let codec = codec();

        let reply = codec
            .decode(br#"{"$protocol-type":"GameCore.S2C_ClientLogin","Error":1,"Name":null}"#)
            .unwrap();
        assert_eq!(
            reply.downcast::<S2CClientLogin>(),
            Some(S2CClientLogin::rejected(LoginError::AccountNotFound))
        );

        let login = codec
            .decode(br#"{"$protocol-type":"GameCore.C2S_ClientLogin","Account":null}"#)
            .unwrap();
        assert_eq!(
            login.downcast::<C2SClientLogin>(),
            Some(C2SClientLogin::default())
        );
    }
}
