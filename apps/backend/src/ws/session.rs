//! The per-connection websocket actor: heartbeats, hello gating, and
//! dispatch of client frames into the room coordinator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::rooms::{Outbound, RoomCoordinator};
use crate::state::app_state::AppState;
use crate::store::{BetTerms, BetType};
use crate::ws::hub::{OutboundMsg, WsHub};
use crate::ws::protocol::{ClientMsg, ErrorCode, ServerMsg, PROTOCOL_VERSION};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(40);

pub async fn upgrade(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = WsSession::new(app_state.coordinator(), app_state.hub());
    ws::start(session, &req, stream)
}

pub struct WsSession {
    conn_id: Uuid,
    /// Set by the `hello` frame; everything else is gated on it.
    player_id: Option<i64>,
    coordinator: Arc<RoomCoordinator>,
    hub: Arc<WsHub>,
    last_heartbeat: Instant,
}

impl WsSession {
    fn new(coordinator: Arc<RoomCoordinator>, hub: Arc<WsHub>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            player_id: None,
            coordinator,
            hub,
            last_heartbeat: Instant::now(),
        }
    }

    fn send_json(ctx: &mut ws::WebsocketContext<Self>, msg: &ServerMsg) {
        match serde_json::to_string(msg) {
            Ok(payload) => ctx.text(payload),
            Err(err) => warn!(error = %err, "failed to serialize outbound frame"),
        }
    }

    fn send_error_and_close(
        &self,
        ctx: &mut ws::WebsocketContext<Self>,
        code: ErrorCode,
        message: impl Into<String>,
    ) {
        Self::send_json(
            ctx,
            &ServerMsg::Error {
                code,
                message: message.into(),
            },
        );
        ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
        ctx.stop();
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |actor, ctx| {
            if Instant::now().duration_since(actor.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    conn_id = %actor.conn_id,
                    player_id = ?actor.player_id,
                    "heartbeat timed out"
                );
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Normal)));
                ctx.stop();
                return;
            }
            ctx.ping(b"keepalive");
        });
    }

    /// Run one coordinator call off the actor and deliver its frames (or
    /// the error) when it resolves.
    fn dispatch<F>(&self, ctx: &mut ws::WebsocketContext<Self>, fut: F)
    where
        F: std::future::Future<Output = Result<Vec<Outbound>, crate::errors::DomainError>>
            + 'static,
    {
        let hub = self.hub.clone();
        ctx.spawn(fut.into_actor(self).map(move |res, actor, ctx| match res {
            Ok(outbounds) => hub.deliver(outbounds),
            Err(err) => {
                info!(
                    conn_id = %actor.conn_id,
                    player_id = ?actor.player_id,
                    %err,
                    "command rejected"
                );
                Self::send_json(ctx, &ServerMsg::error(&err));
            }
        }));
    }

    fn require_player(&self, ctx: &mut ws::WebsocketContext<Self>) -> Option<i64> {
        if self.player_id.is_none() {
            self.send_error_and_close(ctx, ErrorCode::BadRequest, "Must send hello first");
        }
        self.player_id
    }

    fn handle_client_msg(&mut self, cmd: ClientMsg, ctx: &mut ws::WebsocketContext<Self>) {
        if let ClientMsg::Hello {
            protocol,
            player_id,
        } = cmd
        {
            if protocol != PROTOCOL_VERSION {
                self.send_error_and_close(
                    ctx,
                    ErrorCode::BadRequest,
                    "Unsupported protocol version",
                );
                return;
            }
            self.player_id = Some(player_id);
            self.hub
                .register(self.conn_id, player_id, ctx.address().recipient());
            Self::send_json(
                ctx,
                &ServerMsg::Connected {
                    protocol: PROTOCOL_VERSION,
                    player_id,
                },
            );
            return;
        }

        let Some(player_id) = self.require_player(ctx) else {
            return;
        };
        let coordinator = self.coordinator.clone();

        match cmd {
            ClientMsg::Hello { .. } => unreachable!("handled above"),

            ClientMsg::GetLobby => {
                let rooms = coordinator.get_lobby(player_id);
                Self::send_json(ctx, &ServerMsg::LobbyData { rooms });
            }

            ClientMsg::CreateRoom {
                card_count,
                bet_amount,
                bet_type,
            } => {
                let bet = BetTerms {
                    amount: bet_amount,
                    bet_type,
                };
                self.dispatch(ctx, async move {
                    coordinator.create_room(player_id, card_count, bet).await
                });
            }

            ClientMsg::JoinRoom { room_code } => {
                let hub = self.hub.clone();
                self.dispatch(ctx, async move {
                    let outbounds = coordinator.join_room(player_id, &room_code).await?;
                    // Second seat filled: deal once the countdown elapses.
                    let countdown = coordinator.config().countdown_secs;
                    tokio::spawn(async move {
                        sleep(Duration::from_secs(countdown)).await;
                        match coordinator.start_match(&room_code).await {
                            Ok(started) => hub.deliver(started),
                            Err(err) => {
                                warn!(room_code = %room_code, %err, "match start failed");
                            }
                        }
                    });
                    Ok(outbounds)
                });
            }

            ClientMsg::GameAction {
                room_code,
                action,
                idempotency_key,
            } => {
                self.dispatch(ctx, async move {
                    coordinator
                        .game_action(player_id, &room_code, action, idempotency_key.as_deref())
                        .await
                });
            }

            ClientMsg::RequestPause { room_code } => {
                self.dispatch(ctx, async move {
                    coordinator.request_pause(player_id, &room_code).await
                });
            }

            ClientMsg::ApprovePause { room_code, approve } => {
                self.dispatch(ctx, async move {
                    coordinator
                        .approve_pause(player_id, &room_code, approve)
                        .await
                });
            }

            ClientMsg::ResumeGame { room_code } => {
                self.dispatch(ctx, async move {
                    coordinator.resume_game(player_id, &room_code).await
                });
            }

            ClientMsg::ReconnectToRoom { room_code } => {
                self.dispatch(ctx, async move {
                    coordinator.reconnect(player_id, &room_code).await
                });
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(conn_id = %self.conn_id, "ws session started");
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.hub.unregister(self.conn_id);
        info!(
            conn_id = %self.conn_id,
            player_id = ?self.player_id,
            "ws session stopped"
        );

        // Tell opponents only when the player's last socket is gone.
        if let Some(player_id) = self.player_id {
            if !self.hub.is_online(player_id) {
                let coordinator = self.coordinator.clone();
                let hub = self.hub.clone();
                actix::spawn(async move {
                    let outbounds = coordinator.disconnect(player_id).await;
                    hub.deliver(outbounds);
                });
            }
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                let parsed: Result<ClientMsg, _> = serde_json::from_str(&text);
                let Ok(cmd) = parsed else {
                    self.send_error_and_close(ctx, ErrorCode::BadRequest, "Malformed JSON");
                    return;
                };
                self.handle_client_msg(cmd, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
                self.send_error_and_close(ctx, ErrorCode::BadRequest, "Binary not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {
                self.last_heartbeat = Instant::now();
            }
            Err(err) => {
                warn!(
                    conn_id = %self.conn_id,
                    player_id = ?self.player_id,
                    error = %err,
                    "ws protocol error"
                );
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
                ctx.stop();
            }
        }
    }
}

impl Handler<OutboundMsg> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundMsg, ctx: &mut Self::Context) -> Self::Result {
        Self::send_json(ctx, &msg.0);
    }
}
