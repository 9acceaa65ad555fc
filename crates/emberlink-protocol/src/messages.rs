//! The message catalog: every type that travels on the wire.
//!
//! Tags follow `"<namespace>.<TypeName>"` with the `GameCore` namespace,
//! and field names are PascalCase so documents interoperate with peers
//! that use the same catalog. A string field sent as `null` reads as
//! the empty string, like a missing one.
//!
//! | Tag | Direction | Fields |
//! |---|---|---|
//! | `GameCore.C2S_ClientLogin` | client → server | `Account` |
//! | `GameCore.S2C_ClientLogin` | server → client | `Error`, `Name` |
//! | `GameCore.C2S_Heartbeat` | client → server | |
//! | `GameCore.S2C_Heartbeat` | server → client | |

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Protocol, ProtocolError, TypeRegistry};

/// Namespace prefix shared by every catalog tag.
pub const NAMESPACE: &str = "GameCore";

/// Reserved field that carries the tag in a wire document.
pub const DISCRIMINATOR: &str = "$protocol-type";

/// Reads a string field that a peer may send as `null` when unset.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Client asks to log in as `account`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct C2SClientLogin {
    #[serde(deserialize_with = "null_as_empty")]
    pub account: String,
}

impl Protocol for C2SClientLogin {
    const TAG: &'static str = "GameCore.C2S_ClientLogin";
}

/// Why a login was refused.
///
/// Encoded as its numeric value on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum LoginError {
    #[default]
    None = 0,
    AccountNotFound = 1,
}

impl From<LoginError> for u8 {
    fn from(error: LoginError) -> Self {
        error as u8
    }
}

impl TryFrom<u8> for LoginError {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::AccountNotFound),
            other => Err(format!("invalid login error code {other}")),
        }
    }
}

/// Server's answer to [`C2SClientLogin`].
///
/// `name` is the display name on success and empty on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct S2CClientLogin {
    pub error: LoginError,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
}

impl S2CClientLogin {
    pub fn accepted(name: impl Into<String>) -> Self {
        Self {
            error: LoginError::None,
            name: name.into(),
        }
    }

    pub fn rejected(error: LoginError) -> Self {
        Self {
            error,
            name: String::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.error == LoginError::None
    }
}

impl Protocol for S2CClientLogin {
    const TAG: &'static str = "GameCore.S2C_ClientLogin";
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// Client liveness ping; renews the connection's subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct C2SHeartbeat {}

impl Protocol for C2SHeartbeat {
    const TAG: &'static str = "GameCore.C2S_Heartbeat";
}

/// Server-initiated liveness push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S2CHeartbeat {}

impl Protocol for S2CHeartbeat {
    const TAG: &'static str = "GameCore.S2C_Heartbeat";
}

// ---------------------------------------------------------------------------
// Catalog registry
// ---------------------------------------------------------------------------

/// Builds the registry holding every catalog message.
///
/// Both ends of a connection build the same registry.
pub fn registry() -> Result<TypeRegistry, ProtocolError> {
    TypeRegistry::builder()
        .register::<C2SClientLogin>()
        .register::<S2CClientLogin>()
        .register::<C2SHeartbeat>()
        .register::<S2CHeartbeat>()
        .build()
}
