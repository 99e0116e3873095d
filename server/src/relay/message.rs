use huddle_protocol::ServerMessage;

/// Server-to-client traffic on its way to a connection's websocket.
#[hannibal::message]
#[derive(Clone, Debug)]
pub struct Outbound(pub ServerMessage);

impl From<ServerMessage> for Outbound {
    fn from(inner: ServerMessage) -> Self {
        Self(inner)
    }
}

impl From<Outbound> for ServerMessage {
    fn from(val: Outbound) -> Self {
        val.0
    }
}
