//! In-process connection registry. The coordinator produces addressed
//! frames; the hub knows which live sockets belong to which player and
//! pushes the frames into their actor mailboxes.

use actix::prelude::*;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::services::rooms::{Audience, Outbound};
use crate::ws::protocol::ServerMsg;

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct OutboundMsg(pub ServerMsg);

struct Connection {
    player_id: i64,
    recipient: Recipient<OutboundMsg>,
}

/// One per process. A player may hold several connections (tabs); frames
/// addressed to a player go to all of them.
#[derive(Default)]
pub struct WsHub {
    connections: DashMap<Uuid, Connection>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn_id: Uuid, player_id: i64, recipient: Recipient<OutboundMsg>) {
        self.connections.insert(
            conn_id,
            Connection {
                player_id,
                recipient,
            },
        );
        debug!(%conn_id, player_id, "connection registered");
    }

    pub fn unregister(&self, conn_id: Uuid) {
        self.connections.remove(&conn_id);
        debug!(%conn_id, "connection unregistered");
    }

    /// Whether the player still has any live connection.
    pub fn is_online(&self, player_id: i64) -> bool {
        self.connections
            .iter()
            .any(|c| c.value().player_id == player_id)
    }

    pub fn send_to_player(&self, player_id: i64, msg: ServerMsg) {
        for conn in self.connections.iter() {
            if conn.value().player_id == player_id {
                conn.value().recipient.do_send(OutboundMsg(msg.clone()));
            }
        }
    }

    pub fn broadcast_all(&self, msg: ServerMsg) {
        for conn in self.connections.iter() {
            conn.value().recipient.do_send(OutboundMsg(msg.clone()));
        }
    }

    /// Fan a batch of addressed frames out to the live sockets.
    pub fn deliver(&self, outbounds: Vec<Outbound>) {
        for outbound in outbounds {
            match outbound.to {
                Audience::Player(player_id) => self.send_to_player(player_id, outbound.msg),
                Audience::Lobby => self.broadcast_all(outbound.msg),
            }
        }
    }
}
