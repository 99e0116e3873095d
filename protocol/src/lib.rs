//! Public API
//!
//! Wire types spoken between a huddle client and the signaling relay.
//! Everything is tagged JSON; signaling payloads themselves are opaque
//! to the server and forwarded verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Name of a password-gated room, chosen by clients.
#[derive(Clone, Hash, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RoomId(String);

impl<T: Into<String>> From<T> for RoomId {
    fn from(inner: T) -> Self {
        Self(inner.into())
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for RoomId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescription {
    pub connection_id: Uuid,
}

/// The three structurally identical negotiation message kinds the relay
/// forwards without interpreting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command sent to the server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
#[rustfmt::skip]
pub enum ClientCommand {
    /// Join a room, creating it if it doesn't exist yet
    JoinRoom { room: RoomId, password: String, role: String },

    /// Session description offered to the other members of the room
    Offer { payload: Value },

    /// Session description answering an offer
    Answer { payload: Value },

    /// Trickled ICE candidate
    IceCandidate { payload: Value },
}

impl ClientCommand {
    pub fn suggestions() -> String {
        serde_json::to_string_pretty(&[
            ClientCommand::JoinRoom {
                room: "roomName".into(),
                password: "secret".into(),
                role: "presenter".into(),
            },
            ClientCommand::Offer {
                payload: serde_json::json!({ "sdp": "..." }),
            },
        ])
        .unwrap()
    }
}

/// Message received from the server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
#[rustfmt::skip]
pub enum ServerMessage {
    Welcome { connection: ConnectionDescription },

    /// response to `ClientCommand::JoinRoom`
    JoinAck { ok: bool, #[serde(skip_serializing_if = "Option::is_none")] err: Option<String> },

    Offer { payload: Value },
    Answer { payload: Value },
    IceCandidate { payload: Value },

    /// a finished recording became available in the room
    NewFile { filename: String },

    Error { message: String },
}

impl ServerMessage {
    pub fn joined() -> Self {
        ServerMessage::JoinAck { ok: true, err: None }
    }

    pub fn join_refused(msg: impl Into<String>) -> Self {
        ServerMessage::JoinAck {
            ok: false,
            err: Some(msg.into()),
        }
    }

    pub fn signal(kind: SignalKind, payload: Value) -> Self {
        match kind {
            SignalKind::Offer => ServerMessage::Offer { payload },
            SignalKind::Answer => ServerMessage::Answer { payload },
            SignalKind::IceCandidate => ServerMessage::IceCandidate { payload },
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        ServerMessage::Error { message: msg.into() }
    }

    pub fn into_json(self) -> String {
        serde_json::to_string(&self).unwrap()
    }
}
