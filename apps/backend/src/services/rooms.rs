//! Room lifecycle and fan-out. The coordinator owns the room registry and
//! turns every player command into a list of addressed outbound frames; the
//! ws layer only delivers them.
//!
//! Locking rules: room metadata sits behind `parking_lot::RwLock` and is
//! never held across an await; each live match sits behind a
//! `tokio::sync::Mutex` so exactly one command mutates an engine at a time.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::domain::state::{GameAction, Seat};
use crate::domain::{opponent, GameEngine};
use crate::errors::DomainError;
use crate::infra::Clock;
use crate::services::session::{AppliedAction, GameOverInfo, PauseDecision, TurnSession};
use crate::store::{BetTerms, MatchResult, MoveStore, WalletStore};
use crate::utils::generate_room_code;
use crate::ws::protocol::ServerMsg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

/// Mutable room metadata. Cheap to clone out of its lock; the session
/// itself lives in a separate slot.
#[derive(Debug, Clone)]
struct Room {
    code: String,
    status: RoomStatus,
    host_id: i64,
    guest_id: Option<i64>,
    bet: BetTerms,
    card_count: u8,
    created_at: OffsetDateTime,
    started_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
    /// Settlement latch; flipped exactly once.
    settled: bool,
}

/// Lobby-facing projection of a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub code: String,
    pub status: RoomStatus,
    pub host_id: i64,
    pub guest_id: Option<i64>,
    pub bet: BetTerms,
    pub card_count: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Room {
    fn summary(&self) -> RoomSummary {
        RoomSummary {
            code: self.code.clone(),
            status: self.status,
            host_id: self.host_id,
            guest_id: self.guest_id,
            bet: self.bet,
            card_count: self.card_count,
            created_at: self.created_at,
        }
    }

    fn has_player(&self, player_id: i64) -> bool {
        self.host_id == player_id || self.guest_id == Some(player_id)
    }
}

struct RoomEntry {
    meta: RwLock<Room>,
    session: Mutex<Option<TurnSession>>,
}

/// Where one outbound frame goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Player(i64),
    /// Everyone currently watching the lobby.
    Lobby,
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Audience,
    pub msg: ServerMsg,
}

fn to_player(player_id: i64, msg: ServerMsg) -> Outbound {
    Outbound {
        to: Audience::Player(player_id),
        msg,
    }
}

fn to_lobby(msg: ServerMsg) -> Outbound {
    Outbound {
        to: Audience::Lobby,
        msg,
    }
}

pub struct RoomCoordinator {
    rooms: DashMap<String, Arc<RoomEntry>>,
    moves: Arc<dyn MoveStore>,
    wallet: Arc<dyn WalletStore>,
    clock: Arc<dyn Clock>,
    config: GameConfig,
}

impl RoomCoordinator {
    pub fn new(
        moves: Arc<dyn MoveStore>,
        wallet: Arc<dyn WalletStore>,
        clock: Arc<dyn Clock>,
        config: GameConfig,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            moves,
            wallet,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // ---- lobby ----

    /// Waiting rooms inside the lobby window, plus the caller's own live
    /// rooms. Expired waiting rooms flip to abandoned on the way through.
    pub fn get_lobby(&self, player_id: i64) -> Vec<RoomSummary> {
        let now = self.clock.now();
        let mut rooms = Vec::new();
        for entry in self.rooms.iter() {
            let meta = entry.meta.read();
            match meta.status {
                RoomStatus::Waiting => {
                    if now - meta.created_at > self.config.lobby_window {
                        drop(meta);
                        let mut meta = entry.meta.write();
                        if meta.status == RoomStatus::Waiting {
                            meta.status = RoomStatus::Abandoned;
                            info!(room_code = %meta.code, "waiting room expired");
                        }
                        continue;
                    }
                    rooms.push(meta.summary());
                }
                RoomStatus::InProgress | RoomStatus::Paused => {
                    if meta.has_player(player_id) {
                        rooms.push(meta.summary());
                    }
                }
                RoomStatus::Completed | RoomStatus::Abandoned => {}
            }
        }
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms
    }

    // ---- room lifecycle ----

    pub async fn create_room(
        &self,
        player_id: i64,
        card_count: Option<u8>,
        bet: BetTerms,
    ) -> Result<Vec<Outbound>, DomainError> {
        if !self.wallet.has_sufficient_balance(player_id, bet).await? {
            return Err(DomainError::insufficient_balance(format!(
                "stake of {} not covered",
                bet.amount
            )));
        }
        let card_count = card_count.unwrap_or(self.config.card_count);
        let now = self.clock.now();

        let summary = loop {
            let code = generate_room_code();
            match self.rooms.entry(code.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    let room = Room {
                        code,
                        status: RoomStatus::Waiting,
                        host_id: player_id,
                        guest_id: None,
                        bet,
                        card_count,
                        created_at: now,
                        started_at: None,
                        completed_at: None,
                        settled: false,
                    };
                    let summary = room.summary();
                    slot.insert(Arc::new(RoomEntry {
                        meta: RwLock::new(room),
                        session: Mutex::new(None),
                    }));
                    break summary;
                }
            }
        };

        info!(room_code = %summary.code, host_id = player_id, "room created");
        Ok(vec![
            to_player(player_id, ServerMsg::RoomCreated { room: summary }),
            to_lobby(ServerMsg::LobbyUpdated),
        ])
    }

    /// Bind the joiner to seat 1 and announce the countdown. The ws layer
    /// calls [`RoomCoordinator::start_match`] once the countdown elapses.
    pub async fn join_room(
        &self,
        player_id: i64,
        code: &str,
    ) -> Result<Vec<Outbound>, DomainError> {
        let entry = self.entry(code)?;

        let bet = {
            let meta = entry.meta.read();
            if meta.status != RoomStatus::Waiting || meta.guest_id.is_some() {
                return Err(DomainError::validation("room is not open for joining"));
            }
            if meta.host_id == player_id {
                return Err(DomainError::validation("cannot join your own room"));
            }
            meta.bet
        };

        if !self.wallet.has_sufficient_balance(player_id, bet).await? {
            return Err(DomainError::insufficient_balance(format!(
                "stake of {} not covered",
                bet.amount
            )));
        }

        let (host_id, summary) = {
            let mut meta = entry.meta.write();
            // Re-check: someone may have slipped in during the balance call.
            if meta.status != RoomStatus::Waiting || meta.guest_id.is_some() {
                return Err(DomainError::validation("room is not open for joining"));
            }
            meta.guest_id = Some(player_id);
            (meta.host_id, meta.summary())
        };

        info!(room_code = %code, guest_id = player_id, "player joined");
        let starting = ServerMsg::GameStarting {
            room_code: code.to_owned(),
            countdown_secs: self.config.countdown_secs,
        };
        Ok(vec![
            to_player(player_id, ServerMsg::RoomJoined { room: summary }),
            to_player(
                host_id,
                ServerMsg::OpponentJoined {
                    room_code: code.to_owned(),
                    player_id,
                },
            ),
            to_player(host_id, starting.clone()),
            to_player(player_id, starting),
            to_lobby(ServerMsg::LobbyUpdated),
        ])
    }

    /// Deal and go live. Safe to call more than once: only the first call
    /// on a full waiting room does anything.
    pub async fn start_match(&self, code: &str) -> Result<Vec<Outbound>, DomainError> {
        let entry = self.entry(code)?;
        let mut slot = entry.session.lock().await;
        if slot.is_some() {
            return Ok(Vec::new());
        }

        let (host_id, guest_id, bet, card_count) = {
            let meta = entry.meta.read();
            if meta.status != RoomStatus::Waiting {
                return Ok(Vec::new());
            }
            let Some(guest_id) = meta.guest_id else {
                return Err(DomainError::validation("room has no second player"));
            };
            (meta.host_id, guest_id, meta.bet, meta.card_count)
        };

        // Stakes come out before the deal; if the guest cannot pay after
        // all, the host is made whole.
        self.wallet.deduct_bet(host_id, bet).await?;
        if let Err(err) = self.wallet.deduct_bet(guest_id, bet).await {
            self.wallet.award_winnings(host_id, bet, bet.amount).await?;
            return Err(err);
        }

        let now = self.clock.now();
        let seed = rand::rng().random::<u64>();
        let engine = GameEngine::new(seed, card_count)?;
        let session = TurnSession::new(
            Uuid::new_v4(),
            engine,
            [host_id, guest_id],
            self.config.turn_secs,
            self.moves.clone(),
            now,
        );
        let deadline = session.deadline();
        let session_id = session.id();

        let mut outbounds = Vec::with_capacity(3);
        for seat in [0 as Seat, 1] {
            let player_id = session.player_at(seat);
            outbounds.push(to_player(
                player_id,
                ServerMsg::GameStarted {
                    room_code: code.to_owned(),
                    your_seat: seat,
                    your_turn: session.is_turn_of(seat),
                    state: view_json(&session, seat),
                    turn_deadline: deadline,
                },
            ));
        }
        outbounds.push(to_lobby(ServerMsg::LobbyUpdated));

        *slot = Some(session);
        {
            let mut meta = entry.meta.write();
            meta.status = RoomStatus::InProgress;
            meta.started_at = Some(now);
        }
        info!(room_code = %code, %session_id, "match started");
        Ok(outbounds)
    }

    // ---- gameplay ----

    /// Route one game action into the room's session and fan out the
    /// results. Rule violations come back as an `error` frame to the actor,
    /// not as an `Err`.
    pub async fn game_action(
        &self,
        player_id: i64,
        code: &str,
        action: GameAction,
        idempotency_key: Option<&str>,
    ) -> Result<Vec<Outbound>, DomainError> {
        let entry = self.entry(code)?;
        let mut slot = entry.session.lock().await;
        let session = slot
            .as_mut()
            .ok_or_else(|| DomainError::session_not_found(code))?;

        let now = self.clock.now();
        let submitted = action.clone();
        let outcome = session.apply(player_id, action, idempotency_key, now).await;
        let mut outbounds = Vec::new();
        let mut terminal: Option<GameOverInfo> = None;

        if let Some(notice) = outcome.timeout {
            warn!(room_code = %code, seat = notice.seat, seq = notice.seq, "turn timed out");
            for seat in [0 as Seat, 1] {
                outbounds.push(to_player(
                    session.player_at(seat),
                    ServerMsg::TurnTimeout {
                        room_code: code.to_owned(),
                        seat: notice.seat,
                        action: notice.action.clone(),
                        state: view_json(session, seat),
                        is_my_turn: session.is_turn_of(seat),
                        turn_deadline: session.deadline(),
                    },
                ));
            }
            terminal = notice.game_over;
        }

        match outcome.result {
            Ok(AppliedAction::Replayed { snapshot }) => {
                // The original seat must exist for the lookup to have hit.
                let seat = session.seat_of(player_id).unwrap_or_default();
                outbounds.push(to_player(
                    player_id,
                    ServerMsg::GameUpdate {
                        room_code: code.to_owned(),
                        state: snapshot,
                        actor_seat: seat,
                        is_my_turn: session.is_turn_of(seat),
                        action: submitted,
                        result: None,
                        turn_deadline: session.deadline(),
                    },
                ));
            }
            Ok(AppliedAction::Applied {
                actor_seat,
                action,
                game_over,
                ..
            }) => {
                let result = session.engine().state().last_event().cloned();
                for seat in [0 as Seat, 1] {
                    outbounds.push(to_player(
                        session.player_at(seat),
                        ServerMsg::GameUpdate {
                            room_code: code.to_owned(),
                            state: view_json(session, seat),
                            actor_seat,
                            is_my_turn: session.is_turn_of(seat),
                            action: action.clone(),
                            result: result.clone(),
                            turn_deadline: session.deadline(),
                        },
                    ));
                }
                terminal = terminal.or(game_over);
            }
            Err(err) => {
                outbounds.push(to_player(player_id, ServerMsg::error(&err)));
            }
        }

        if let Some(over) = terminal {
            outbounds.extend(self.settle(&entry, session, code, over).await);
            outbounds.push(to_lobby(ServerMsg::LobbyUpdated));
        }
        Ok(outbounds)
    }

    /// Pay out and close the room. The latch in the metadata makes this a
    /// no-op on any call after the first.
    async fn settle(
        &self,
        entry: &RoomEntry,
        session: &TurnSession,
        code: &str,
        over: GameOverInfo,
    ) -> Vec<Outbound> {
        let bet = {
            let mut meta = entry.meta.write();
            if meta.settled {
                return Vec::new();
            }
            meta.settled = true;
            meta.status = RoomStatus::Completed;
            meta.completed_at = Some(self.clock.now());
            meta.bet
        };

        let winner_seat = over.winner_seat;
        let winner = session.player_at(winner_seat);
        let loser = session.player_at(opponent(winner_seat));
        let prize_pool = bet.prize_pool();

        let winner_balance = match self.wallet.award_winnings(winner, bet, prize_pool).await {
            Ok(balance) => balance,
            Err(err) => {
                error!(room_code = %code, winner, %err, "prize payout failed");
                0
            }
        };
        if let Err(err) = self.wallet.record_result(winner, MatchResult::Won).await {
            warn!(room_code = %code, winner, %err, "result recording failed");
        }
        if let Err(err) = self.wallet.record_result(loser, MatchResult::Lost).await {
            warn!(room_code = %code, loser, %err, "result recording failed");
        }
        let loser_balance = self.wallet.balance(loser, bet.bet_type).await.unwrap_or(0);

        info!(
            room_code = %code,
            winner_seat,
            win = ?over.win,
            prize_pool,
            "match settled"
        );

        let mut outbounds = Vec::with_capacity(4);
        for seat in [0 as Seat, 1] {
            outbounds.push(to_player(
                session.player_at(seat),
                ServerMsg::GameOver {
                    room_code: code.to_owned(),
                    winner_seat,
                    win: over.win,
                    state: view_json(session, seat),
                    prize_pool,
                },
            ));
        }
        outbounds.push(to_player(
            winner,
            ServerMsg::GameOverPersonal {
                room_code: code.to_owned(),
                new_balance: winner_balance,
                winnings_awarded: prize_pool,
            },
        ));
        outbounds.push(to_player(
            loser,
            ServerMsg::GameOverPersonal {
                room_code: code.to_owned(),
                new_balance: loser_balance,
                winnings_awarded: 0,
            },
        ));
        outbounds
    }

    // ---- pause / resume ----

    pub async fn request_pause(
        &self,
        player_id: i64,
        code: &str,
    ) -> Result<Vec<Outbound>, DomainError> {
        let entry = self.entry(code)?;
        let mut slot = entry.session.lock().await;
        let session = slot
            .as_mut()
            .ok_or_else(|| DomainError::session_not_found(code))?;

        let seat = session.request_pause(player_id)?;
        let other = session.player_at(opponent(seat));
        Ok(vec![
            to_player(
                player_id,
                ServerMsg::PauseRequestSent {
                    room_code: code.to_owned(),
                },
            ),
            to_player(
                other,
                ServerMsg::PauseRequested {
                    room_code: code.to_owned(),
                    seat,
                },
            ),
        ])
    }

    pub async fn approve_pause(
        &self,
        player_id: i64,
        code: &str,
        approve: bool,
    ) -> Result<Vec<Outbound>, DomainError> {
        let entry = self.entry(code)?;
        let mut slot = entry.session.lock().await;
        let session = slot
            .as_mut()
            .ok_or_else(|| DomainError::session_not_found(code))?;

        let decision = session.resolve_pause(player_id, approve)?;
        let msg = match decision {
            PauseDecision::Paused => {
                entry.meta.write().status = RoomStatus::Paused;
                info!(room_code = %code, "match paused");
                ServerMsg::GamePaused {
                    room_code: code.to_owned(),
                }
            }
            PauseDecision::Rejected => ServerMsg::PauseRejected {
                room_code: code.to_owned(),
            },
        };
        Ok(both_players(session, msg))
    }

    pub async fn resume_game(
        &self,
        player_id: i64,
        code: &str,
    ) -> Result<Vec<Outbound>, DomainError> {
        let entry = self.entry(code)?;
        let mut slot = entry.session.lock().await;
        let session = slot
            .as_mut()
            .ok_or_else(|| DomainError::session_not_found(code))?;

        session.resume(player_id, self.clock.now())?;
        entry.meta.write().status = RoomStatus::InProgress;
        info!(room_code = %code, "match resumed");

        let mut outbounds = Vec::with_capacity(2);
        for seat in [0 as Seat, 1] {
            outbounds.push(to_player(
                session.player_at(seat),
                ServerMsg::GameResumed {
                    room_code: code.to_owned(),
                    state: view_json(session, seat),
                    is_my_turn: session.is_turn_of(seat),
                    turn_deadline: session.deadline(),
                },
            ));
        }
        Ok(outbounds)
    }

    // ---- connection lifecycle ----

    /// Mark the player disconnected in every live room they occupy and
    /// notify the opponents.
    pub async fn disconnect(&self, player_id: i64) -> Vec<Outbound> {
        let live: Vec<(String, Arc<RoomEntry>)> = self
            .rooms
            .iter()
            .filter(|entry| {
                let meta = entry.meta.read();
                matches!(meta.status, RoomStatus::InProgress | RoomStatus::Paused)
                    && meta.has_player(player_id)
            })
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let now = self.clock.now();
        let mut outbounds = Vec::new();
        for (code, entry) in live {
            let mut slot = entry.session.lock().await;
            let Some(session) = slot.as_mut() else {
                continue;
            };
            let Some(seat) = session.mark_disconnected(player_id, now) else {
                continue;
            };
            info!(room_code = %code, seat, "player disconnected");
            outbounds.push(to_player(
                session.player_at(opponent(seat)),
                ServerMsg::OpponentDisconnected {
                    room_code: code,
                    seat,
                    reconnect_window_secs: self.config.reconnect_window_secs,
                },
            ));
        }
        outbounds
    }

    /// Reattach a player to a live room: resend the masked snapshot and
    /// tell the opponent. If the session is gone from the registry, a fresh
    /// match is dealt in its place; prior progress is lost.
    pub async fn reconnect(
        &self,
        player_id: i64,
        code: &str,
    ) -> Result<Vec<Outbound>, DomainError> {
        let entry = self.entry(code)?;
        let mut slot = entry.session.lock().await;

        if slot.is_none() {
            let (host_id, guest_id, card_count, status) = {
                let meta = entry.meta.read();
                let Some(guest_id) = meta.guest_id else {
                    return Err(DomainError::session_not_found(code));
                };
                (meta.host_id, guest_id, meta.card_count, meta.status)
            };
            if !matches!(status, RoomStatus::InProgress | RoomStatus::Paused) {
                return Err(DomainError::session_not_found(code));
            }
            error!(room_code = %code, "live session missing from registry, dealing a fresh match");
            let now = self.clock.now();
            let engine = GameEngine::new(rand::rng().random::<u64>(), card_count)?;
            let session = TurnSession::new(
                Uuid::new_v4(),
                engine,
                [host_id, guest_id],
                self.config.turn_secs,
                self.moves.clone(),
                now,
            );
            let mut outbounds = Vec::with_capacity(2);
            for seat in [0 as Seat, 1] {
                outbounds.push(to_player(
                    session.player_at(seat),
                    ServerMsg::GameStarted {
                        room_code: code.to_owned(),
                        your_seat: seat,
                        your_turn: session.is_turn_of(seat),
                        state: view_json(&session, seat),
                        turn_deadline: session.deadline(),
                    },
                ));
            }
            *slot = Some(session);
            entry.meta.write().status = RoomStatus::InProgress;
            return Ok(outbounds);
        }

        let session = slot
            .as_mut()
            .ok_or_else(|| DomainError::session_not_found(code))?;
        let seat = session.reconnect(player_id, self.clock.now())?;
        info!(room_code = %code, seat, "player reconnected");
        Ok(vec![
            to_player(
                player_id,
                ServerMsg::GameStarted {
                    room_code: code.to_owned(),
                    your_seat: seat,
                    your_turn: session.is_turn_of(seat),
                    state: view_json(session, seat),
                    turn_deadline: session.deadline(),
                },
            ),
            to_player(
                session.player_at(opponent(seat)),
                ServerMsg::OpponentReconnected {
                    room_code: code.to_owned(),
                    seat,
                },
            ),
        ])
    }

    fn entry(&self, code: &str) -> Result<Arc<RoomEntry>, DomainError> {
        self.rooms
            .get(code)
            .map(|e| e.value().clone())
            .ok_or_else(|| DomainError::room_not_found(code))
    }
}

fn view_json(session: &TurnSession, seat: Seat) -> serde_json::Value {
    serde_json::to_value(session.view(seat)).unwrap_or(serde_json::Value::Null)
}

fn both_players(session: &TurnSession, msg: ServerMsg) -> Vec<Outbound> {
    vec![
        to_player(session.player_at(0), msg.clone()),
        to_player(session.player_at(1), msg),
    ]
}
