use futures::SinkExt;
use hannibal::{Context, StreamHandler};
use tracing::{debug, trace, warn};
use warp::ws::Message;

use huddle_protocol::{ClientCommand, ServerMessage};

use super::{error::Error, Connection};

type WsStreamMessage = std::result::Result<warp::ws::Message, warp::Error>;

#[async_trait::async_trait]
impl StreamHandler<WsStreamMessage> for Connection {
    async fn handle(&mut self, ctx: &mut Context<Self>, received: WsStreamMessage) {
        match received {
            Ok(msg) => {
                if msg.is_close() {
                    debug!("websocket disconnected");
                    ctx.stop(None);
                } else if let Ok(content) = msg.to_str() {
                    trace!("received {:?}", content);
                    match self.handle_incoming_message(content, ctx).await {
                        Ok(()) => trace!("connection {} accepted the command", self.connection_id),
                        Err(error) => {
                            warn!("connection {} rejected a frame: {}", self.connection_id, error);
                            if matches!(error, Error::Parsing(_)) {
                                debug!("suggestions:\n{}", ClientCommand::suggestions());
                            }
                            self.send(ServerMessage::err(error.to_string()).into_json()).await;
                        }
                    }
                } else if msg.is_ping() {
                    if let Err(error) = self.ws_sender.send(Message::pong(msg.as_bytes())).await {
                        warn!("failed to send pong {}", error);
                    }
                } else {
                    // binary and pong frames carry nothing for the relay
                    trace!("ignoring non-text frame");
                }
            }
            Err(err) => {
                warn!("received ws error {}", err);
                ctx.stop(Some(err.into()));
            }
        }
    }
}
