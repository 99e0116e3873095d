//! # Client Connection
//!
//! Terminates the WebSocket and talks to the [`SignalingRelay`]

use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream},
    StreamExt,
};
use hannibal::{Context, Service};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use huddle_protocol::{ClientCommand, ConnectionDescription, RoomId, ServerMessage, SignalKind};

use crate::registry::ConnectionId;
use crate::relay::{command, SignalingRelay};

mod actor;
mod error;
mod stream_handler;

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

pub struct Connection {
    connection_id: ConnectionId,

    ws_sender: WsSender,

    /// receiver on websocket
    /// this is taken out of here after starting by `Actor::started()`
    ws_receiver: Option<WsReceiver>,
}

impl Connection {
    pub fn new(ws: WebSocket) -> Self {
        let connection_id = Uuid::new_v4();
        info!("new connection established {}", connection_id);
        let (ws_sender, ws_receiver) = ws.split();
        Connection {
            connection_id,
            ws_sender,
            ws_receiver: Some(ws_receiver),
        }
    }

    async fn send(&mut self, msg: impl ToString) {
        let payload = msg.to_string();
        if let Err(error) = self.ws_sender.send(Message::text(&payload)).await {
            warn!("failed to send message on websocket {} {}", payload, error);
        }
    }

    async fn send_welcome(&mut self) {
        self.send(
            ServerMessage::Welcome {
                connection: ConnectionDescription {
                    connection_id: self.connection_id,
                },
            }
            .into_json(),
        )
        .await;
    }

    async fn handle_incoming_message(&mut self, raw_msg: &str, ctx: &mut Context<Self>) -> Result<(), error::Error> {
        match serde_json::from_str::<ClientCommand>(raw_msg)? {
            ClientCommand::JoinRoom { room, password, role } => {
                self.join_room(room, password, role, ctx).await?
            }
            ClientCommand::Offer { payload } => self.forward_signal(SignalKind::Offer, payload).await?,
            ClientCommand::Answer { payload } => self.forward_signal(SignalKind::Answer, payload).await?,
            ClientCommand::IceCandidate { payload } => {
                self.forward_signal(SignalKind::IceCandidate, payload).await?
            }
        }
        Ok(())
    }

    /// Synchronous request/ack: the relay decides, the client hears back.
    async fn join_room(
        &mut self,
        room: RoomId,
        password: String,
        role: String,
        ctx: &mut Context<Self>,
    ) -> Result<(), error::Error> {
        let relay = SignalingRelay::from_registry().await?;
        let ack = relay
            .call(command::Join {
                connection_id: self.connection_id,
                sender: ctx.address().sender(),
                room: room.clone(),
                password,
                role,
            })
            .await?;

        match ack {
            Ok(()) => {
                info!("{} joined {}", self.connection_id, room);
                self.send(ServerMessage::joined().into_json()).await;
            }
            Err(refusal) => {
                debug!("{} was refused {}: {}", self.connection_id, room, refusal);
                self.send(ServerMessage::join_refused(refusal.to_string()).into_json())
                    .await;
            }
        }
        Ok(())
    }

    /// Fire-and-forget: the relay never acknowledges signaling traffic.
    async fn forward_signal(&mut self, kind: SignalKind, payload: Value) -> Result<(), error::Error> {
        let relay = SignalingRelay::from_registry().await?;
        relay.send(command::Signal {
            connection_id: self.connection_id,
            kind,
            payload,
        })?;
        Ok(())
    }
}
