//! Wire envelope for ceremony messages.
//!
//! Every frame on the wire carries exactly one JSON-encoded `Envelope`.
//! `kind` and `msg_id` together form the routing key; the payload is
//! opaque protocol content that this layer never decodes.

use serde::{Deserialize, Serialize};

use crate::wire::WireError;

/// Closed set of protocol message categories.
///
/// These are the topics subscriptions are keyed on. Adding a variant is a
/// wire-format change — both sides must agree on the names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgKind {
    /// Key-generation round message.
    Keygen,
    /// Key-signing round message.
    Keysign,
    /// Reliable-broadcast verification for a keygen round.
    KeygenVerify,
    /// Reliable-broadcast verification for a keysign round.
    KeysignVerify,
    /// Liveness check between ceremony participants.
    Liveness,
}

impl MsgKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgKind::Keygen => "keygen",
            MsgKind::Keysign => "keysign",
            MsgKind::KeygenVerify => "keygen_verify",
            MsgKind::KeysignVerify => "keysign_verify",
            MsgKind::Liveness => "liveness",
        }
    }
}

impl std::fmt::Display for MsgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of wire transfer: `{messageType, msgID, payload}`.
///
/// `msg_id` is caller-assigned and scopes the message to one protocol
/// round or session. Uniqueness is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "messageType")]
    pub kind: MsgKind,
    #[serde(rename = "msgID")]
    pub msg_id: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(kind: MsgKind, msg_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            kind,
            msg_id: msg_id.into(),
            payload,
        }
    }

    /// Serialize for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from a received frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(data)?)
    }
}
