use std::time::Duration;

use async_trait::async_trait;
use hannibal::{Actor, Context, Handler, Service};
use tracing::{debug, trace, warn};

use huddle_protocol::ServerMessage;

use crate::metrics::MetricsService;
use crate::registry::{ConnectionId, JoinError};

use super::command::{Authenticate, Disconnect, FileAvailable, Gc, Join, Signal};
use super::message::Outbound;
use super::SignalingRelay;

#[async_trait]
impl Actor for SignalingRelay {
    const NAME: &'static str = module_path!();

    async fn started(&mut self, ctx: &mut hannibal::Context<Self>) -> hannibal::Result<()> {
        trace!("starting");
        if let Some(gauge) = MetricsService::get_gauge("open_rooms", "rooms known to the registry").await? {
            self.open_rooms = Some(gauge);
        }
        if let Some(gauge) =
            MetricsService::get_gauge("bound_connections", "connections currently bound to a room").await?
        {
            self.bound_connections = Some(gauge);
        }
        ctx.send_interval(Gc, Duration::from_secs(30));
        Ok(())
    }

    async fn stopped(&mut self, _ctx: &mut hannibal::Context<Self>) {
        trace!("shutting down");
    }
}

impl Service for SignalingRelay {}

impl SignalingRelay {
    fn deliver(&self, targets: &[ConnectionId], message: ServerMessage) {
        for connection_id in targets {
            if let Some(sender) = self.connections.get(connection_id) {
                if let Err(error) = sender.send(Outbound(message.clone())) {
                    warn!("failed to forward message to {} {}", connection_id, error);
                }
            } else {
                warn!("member {} has no live connection, skipping", connection_id);
            }
        }
    }
}

#[async_trait]
impl Handler<Join> for SignalingRelay {
    #[tracing::instrument(level = "debug", skip_all, name = "join")]
    async fn handle(&mut self, _ctx: &mut Context<Self>, msg: Join) -> Result<(), JoinError> {
        let Join {
            connection_id,
            sender,
            room,
            password,
            role,
        } = msg;

        let outcome = self.join(connection_id, room, &password, role);
        match &outcome {
            Ok(()) => {
                self.connections.insert(connection_id, sender);
            }
            Err(refusal) => debug!("join refused for {}: {}", connection_id, refusal),
        }
        self.update_gauges();
        outcome
    }
}

#[async_trait]
impl Handler<Signal> for SignalingRelay {
    async fn handle(&mut self, _ctx: &mut Context<Self>, msg: Signal) {
        match self.signal_targets(&msg.connection_id) {
            // best effort: not an error the sender gets to see
            None => trace!("dropping {} from unbound connection {}", msg.kind, msg.connection_id),
            Some(targets) => {
                trace!("relaying {} from {} to {} peers", msg.kind, msg.connection_id, targets.len());
                self.deliver(&targets, ServerMessage::signal(msg.kind, msg.payload));
            }
        }
    }
}

#[async_trait]
impl Handler<Disconnect> for SignalingRelay {
    async fn handle(&mut self, _ctx: &mut Context<Self>, msg: Disconnect) {
        self.disconnect(&msg.connection_id);
        self.update_gauges();
    }
}

#[async_trait]
impl Handler<Authenticate> for SignalingRelay {
    async fn handle(&mut self, _ctx: &mut Context<Self>, msg: Authenticate) -> bool {
        self.registry.authenticate(&msg.room, &msg.secret)
    }
}

#[async_trait]
impl Handler<FileAvailable> for SignalingRelay {
    async fn handle(&mut self, _ctx: &mut Context<Self>, msg: FileAvailable) {
        let targets = self.broadcast_targets(&msg.room);
        if targets.is_empty() {
            trace!("new file {} in {} but nobody is connected", msg.filename, msg.room);
            return;
        }
        debug!("announcing {} to {} members of {}", msg.filename, targets.len(), msg.room);
        self.deliver(&targets, ServerMessage::NewFile { filename: msg.filename });
    }
}

#[async_trait]
impl Handler<Gc> for SignalingRelay {
    async fn handle(&mut self, _ctx: &mut Context<Self>, _: Gc) {
        let dead = self
            .connections
            .iter()
            .filter(|(_, sender)| !sender.can_upgrade())
            .map(|(connection_id, _)| *connection_id)
            .collect::<Vec<_>>();

        if dead.is_empty() {
            return;
        }
        debug!("garbage collecting {} dead connections", dead.len());
        for connection_id in &dead {
            self.disconnect(connection_id);
        }
        self.update_gauges();
    }
}
