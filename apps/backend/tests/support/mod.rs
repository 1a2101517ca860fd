#![allow(dead_code)]

pub mod logging;

use std::sync::Arc;

use time::macros::datetime;

use dealuxe_backend::config::GameConfig;
use dealuxe_backend::domain::GameAction;
use dealuxe_backend::infra::{Clock, ManualClock};
use dealuxe_backend::services::rooms::{Audience, Outbound, RoomCoordinator};
use dealuxe_backend::store::{BetTerms, BetType, InMemoryMoveStore, InMemoryWallet};
use dealuxe_backend::ws::ServerMsg;

pub const HOST: i64 = 101;
pub const GUEST: i64 = 202;
pub const STARTING_BALANCE: i64 = 1_000;
pub const BET: BetTerms = BetTerms {
    amount: 100,
    bet_type: BetType::Fake,
};

pub struct Harness {
    pub coordinator: RoomCoordinator,
    pub wallet: Arc<InMemoryWallet>,
    pub moves: Arc<InMemoryMoveStore>,
    pub clock: ManualClock,
}

/// Coordinator wired to in-memory stores and a hand-advanced clock, with
/// both standard players funded.
pub fn harness() -> Harness {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.grant(HOST, BET.bet_type, STARTING_BALANCE);
    wallet.grant(GUEST, BET.bet_type, STARTING_BALANCE);
    let moves = Arc::new(InMemoryMoveStore::new());
    let clock = ManualClock::new(datetime!(2026-01-01 00:00 UTC));
    let coordinator = RoomCoordinator::new(
        moves.clone(),
        wallet.clone(),
        Arc::new(clock.clone()) as Arc<dyn Clock>,
        GameConfig::default(),
    );
    Harness {
        coordinator,
        wallet,
        moves,
        clock,
    }
}

/// Frames addressed to one player, in emission order.
pub fn msgs_to(outbounds: &[Outbound], player_id: i64) -> Vec<&ServerMsg> {
    outbounds
        .iter()
        .filter(|o| o.to == Audience::Player(player_id))
        .map(|o| &o.msg)
        .collect()
}

/// Create a room, join it, and deal. Returns the room code and the
/// `game_started` batch.
pub async fn started_room(h: &Harness) -> (String, Vec<Outbound>) {
    let created = h.coordinator.create_room(HOST, None, BET).await.unwrap();
    let code = msgs_to(&created, HOST)
        .iter()
        .find_map(|msg| match msg {
            ServerMsg::RoomCreated { room } => Some(room.code.clone()),
            _ => None,
        })
        .expect("room_created frame");
    h.coordinator.join_room(GUEST, &code).await.unwrap();
    let started = h.coordinator.start_match(&code).await.unwrap();
    (code, started)
}

/// The `game_started` state frame sent to one player.
pub fn started_state(started: &[Outbound], player_id: i64) -> serde_json::Value {
    msgs_to(started, player_id)
        .iter()
        .find_map(|msg| match msg {
            ServerMsg::GameStarted { state, .. } => Some(state.clone()),
            _ => None,
        })
        .expect("game_started frame")
}

/// A move the opening attacker (seat 0) can legally make, derived from
/// their own masked snapshot. Works whether the deal opened in the attack
/// phase or dropped straight into the trail.
pub fn first_valid_action(state: &serde_json::Value) -> GameAction {
    let hand = state["players"][0]["hand"]
        .as_array()
        .expect("own hand visible")
        .clone();
    match state["phase"].as_str().unwrap_or_default() {
        "ATTACK" => {
            let index = hand
                .iter()
                .position(|c| c["value"].as_u64().unwrap_or(0) >= 4)
                .expect("attack phase implies an attack-capable card");
            GameAction::Attack { index }
        }
        "RULE_8" => {
            let value = hand
                .iter()
                .map(|c| c["value"].as_u64().unwrap_or(1) as u8)
                .min()
                .expect("trail entry implies a non-empty hand");
            GameAction::Rule8Drop { value }
        }
        other => panic!("unexpected opening phase {other}"),
    }
}
