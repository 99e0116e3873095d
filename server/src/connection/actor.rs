use async_trait::async_trait;
use hannibal::{Actor, Context, Handler, Service};
use tracing::{debug, error, trace, warn};

use crate::relay::{command, message::Outbound, SignalingRelay};

use super::Connection;

#[async_trait]
impl Actor for Connection {
    async fn started(&mut self, ctx: &mut hannibal::Context<Self>) -> hannibal::Result<()> {
        trace!("starting connection {} on actor {:?}", self.connection_id, ctx.actor_id());

        if let Some(ws_receiver) = self.ws_receiver.take() {
            ctx.add_stream(ws_receiver);
            self.send_welcome().await;
        } else {
            error!("unable to take ws_receiver stream");
            ctx.stop(None);
        }
        Ok(())
    }

    async fn stopped(&mut self, _ctx: &mut hannibal::Context<Self>) {
        debug!("connection {} closed", self.connection_id);
        match SignalingRelay::from_registry().await {
            Ok(relay) => {
                if let Err(error) = relay.send(command::Disconnect {
                    connection_id: self.connection_id,
                }) {
                    warn!("failed to report disconnect of {} {}", self.connection_id, error);
                }
            }
            Err(error) => warn!("relay unreachable during cleanup {}", error),
        }
    }
}

#[async_trait]
impl Handler<Outbound> for Connection {
    async fn handle(&mut self, _ctx: &mut Context<Self>, msg: Outbound) {
        trace!("delivering to {} {:?}", self.connection_id, &msg);
        self.send(msg.0.into_json()).await;
    }
}
