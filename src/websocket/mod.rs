use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, warn};
use uuid::Uuid;

use crate::models::messages::{ClientMessage, CloseChannel, OutboundFrame, ServerMessage};
use crate::server::connections::ChannelHandle;
use crate::server::{Connect, Disconnect, GameServer, Inbound};

/// One websocket connection. The session only decodes frames and forwards
/// them; every decision, including whether this connection stays open,
/// belongs to the game server.
pub struct WsSession {
    pub id: Uuid,
    pub peer: Option<String>,
    pub server: Addr<GameServer>,
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!(
            "Websocket session {} started from {}",
            self.id,
            self.peer.as_deref().unwrap_or("unknown")
        );
        let channel = ChannelHandle::new(
            self.id,
            self.peer.clone(),
            ctx.address().recipient(),
            ctx.address().recipient(),
        );
        self.server.do_send(Connect { channel });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.server.do_send(Disconnect {
            channel_id: self.id,
        });
        Running::Stop
    }
}

impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<CloseChannel> for WsSession {
    type Result = ();

    fn handle(&mut self, _: CloseChannel, ctx: &mut Self::Context) {
        debug!("Websocket session {} closed by the server", self.id);
        ctx.close(None);
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(text.as_ref()) {
                    Ok(message) => {
                        self.server.do_send(Inbound {
                            channel_id: self.id,
                            message,
                        });
                    }
                    Err(err) => {
                        warn!("Session {} sent unparseable JSON: {}", self.id, err);
                        let notice =
                            ServerMessage::error(format!("invalid message format: {}", err));
                        ctx.text(notice.to_frame());
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("Session {} sent a binary frame", self.id);
                ctx.text(ServerMessage::error("binary messages are not supported").to_frame());
            }
            Ok(ws::Message::Close(reason)) => {
                debug!("Session {} closed by the client: {:?}", self.id, reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

/// Upgrades an HTTP request into a websocket session.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Addr<GameServer>>,
) -> Result<HttpResponse, Error> {
    let id = Uuid::new_v4();
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    debug!("New websocket connection request {} from {:?}", id, peer);
    let session = WsSession {
        id,
        peer,
        server: server.get_ref().clone(),
    };
    ws::start(session, &req, stream)
}
