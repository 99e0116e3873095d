use hannibal::Sender;
use serde_json::Value;

use huddle_protocol::{RoomId, SignalKind};

use crate::registry::{ConnectionId, JoinError};

use super::message::Outbound;

/// Bind a connection to a room, creating the room on first contact.
#[hannibal::message(result = "Result<(), JoinError>")]
pub struct Join {
    pub connection_id: ConnectionId,
    pub sender: Sender<Outbound>,
    pub room: RoomId,
    pub password: String,
    pub role: String,
}

/// Opaque negotiation message to fan out to the rest of the sender's room.
#[hannibal::message]
#[derive(Debug)]
pub struct Signal {
    pub connection_id: ConnectionId,
    pub kind: SignalKind,
    pub payload: Value,
}

/// Lifecycle cleanup, delivered when a websocket goes away.
#[hannibal::message]
#[derive(Debug)]
pub struct Disconnect {
    pub connection_id: ConnectionId,
}

/// Room+secret check for the upload routes.
#[hannibal::message(result = "bool")]
#[derive(Debug)]
pub struct Authenticate {
    pub room: RoomId,
    pub secret: String,
}

/// A recording was durably stored; tell the room.
#[hannibal::message]
#[derive(Debug)]
pub struct FileAvailable {
    pub room: RoomId,
    pub filename: String,
}

#[hannibal::message]
#[derive(Clone, Copy, Debug)]
pub struct Gc;
