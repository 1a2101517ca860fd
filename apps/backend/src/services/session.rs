//! One live match: the engine plus everything the engine refuses to know
//! about (player identity, deadlines, idempotency, pause negotiation).
//!
//! A session is single-writer: the room layer holds it behind a
//! `tokio::sync::Mutex`, so methods here take `&mut self` and never race.
//! The clock is passed in as `now` so deadline behavior is deterministic
//! under test.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::rules::first_attack_index;
use crate::domain::state::{GameAction, Phase, Rule8Step, Seat, WinKind};
use crate::domain::{GameEngine, PlayerView};
use crate::errors::DomainError;
use crate::store::{MoveRecord, MoveStore};

#[derive(Debug, Clone, Copy)]
pub struct SeatBinding {
    pub player_id: i64,
    pub connected: bool,
    pub last_seen: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOverInfo {
    pub winner_seat: Seat,
    pub win: WinKind,
}

/// A scripted move applied on behalf of an overdue seat, reported to the
/// room layer so it can broadcast the timeout before the triggering action.
#[derive(Debug, Clone)]
pub struct TimeoutNotice {
    pub seat: Seat,
    pub action: GameAction,
    pub seq: u64,
    pub game_over: Option<GameOverInfo>,
}

#[derive(Debug, Clone)]
pub enum AppliedAction {
    /// Idempotency-key hit: the cached snapshot, engine untouched.
    Replayed { snapshot: serde_json::Value },
    Applied {
        seq: u64,
        actor_seat: Seat,
        action: GameAction,
        game_over: Option<GameOverInfo>,
    },
}

/// Outcome of submitting one action. A timeout fallback may have fired even
/// when the submitted action itself was rejected.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub timeout: Option<TimeoutNotice>,
    pub result: Result<AppliedAction, DomainError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseDecision {
    Paused,
    Rejected,
}

pub struct TurnSession {
    id: Uuid,
    engine: GameEngine,
    seats: [SeatBinding; 2],
    turn_deadline: OffsetDateTime,
    turn_duration: Duration,
    /// Next sequence number to assign; contiguous from 1.
    next_seq: u64,
    pause_requested_by: Option<Seat>,
    paused: bool,
    moves: Arc<dyn MoveStore>,
}

impl TurnSession {
    pub fn new(
        id: Uuid,
        engine: GameEngine,
        players: [i64; 2],
        turn_secs: u64,
        moves: Arc<dyn MoveStore>,
        now: OffsetDateTime,
    ) -> Self {
        let turn_duration = Duration::seconds(turn_secs as i64);
        Self {
            id,
            engine,
            seats: players.map(|player_id| SeatBinding {
                player_id,
                connected: true,
                last_seen: now,
            }),
            turn_deadline: now + turn_duration,
            turn_duration,
            next_seq: 1,
            pause_requested_by: None,
            paused: false,
            moves,
        }
    }

    // ---- reads ----

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn deadline(&self) -> OffsetDateTime {
        self.turn_deadline
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_requester(&self) -> Option<Seat> {
        self.pause_requested_by
    }

    pub fn seat_of(&self, player_id: i64) -> Option<Seat> {
        self.seats
            .iter()
            .position(|b| b.player_id == player_id)
            .map(|i| i as Seat)
    }

    pub fn player_at(&self, seat: Seat) -> i64 {
        self.seats[seat as usize].player_id
    }

    pub fn both_connected(&self) -> bool {
        self.seats.iter().all(|b| b.connected)
    }

    pub fn view(&self, seat: Seat) -> PlayerView {
        PlayerView::project(&self.engine, seat)
    }

    /// Whether `seat` is the one expected to act right now.
    pub fn is_turn_of(&self, seat: Seat) -> bool {
        self.engine.acting_seat() == Some(seat)
    }

    // ---- action pipeline ----

    /// Submit one action on behalf of `player_id`.
    ///
    /// Pipeline: authorize, replay on idempotency hit, script a fallback for
    /// an overdue turn, then apply and log. The move log append is
    /// best-effort: a failure is logged and the action still stands.
    pub async fn apply(
        &mut self,
        player_id: i64,
        action: GameAction,
        idempotency_key: Option<&str>,
        now: OffsetDateTime,
    ) -> ApplyOutcome {
        let Some(seat) = self.seat_of(player_id) else {
            return ApplyOutcome {
                timeout: None,
                result: Err(DomainError::not_in_room(format!(
                    "player {player_id} holds no seat in this match"
                ))),
            };
        };

        if self.paused {
            return ApplyOutcome {
                timeout: None,
                result: Err(DomainError::validation("the match is paused")),
            };
        }

        if let Some(key) = idempotency_key {
            match self.moves.find_by_idempotency_key(self.id, key).await {
                Ok(Some(record)) => {
                    return ApplyOutcome {
                        timeout: None,
                        result: Ok(AppliedAction::Replayed {
                            snapshot: record.result_snapshot,
                        }),
                    };
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(session_id = %self.id, %err, "idempotency lookup failed, applying anyway");
                }
            }
        }

        let timeout = self.run_overdue_fallback(now).await;

        let result = match self.apply_to_engine(seat, &action) {
            Err(err) => Err(err),
            Ok(()) => {
                let game_over = self.game_over_info();
                let seq = self
                    .log_move(seat, action.clone(), idempotency_key, now)
                    .await;
                self.turn_deadline = now + self.turn_duration;
                Ok(AppliedAction::Applied {
                    seq,
                    actor_seat: seat,
                    action,
                    game_over,
                })
            }
        };

        ApplyOutcome { timeout, result }
    }

    /// If the turn deadline passed, apply the scripted fallback for the
    /// overdue seat and advance the deadline.
    async fn run_overdue_fallback(&mut self, now: OffsetDateTime) -> Option<TimeoutNotice> {
        if self.engine.state().game_over || now <= self.turn_deadline {
            return None;
        }
        let (seat, action) = self.fallback_action()?;
        if let Err(err) = self.apply_to_engine(seat, &action) {
            // A fallback is computed from live state and should not fail.
            error!(session_id = %self.id, %err, "timeout fallback rejected by engine");
            return None;
        }
        let game_over = self.game_over_info();
        let seq = self.log_move(seat, action.clone(), None, now).await;
        self.turn_deadline = now + self.turn_duration;
        Some(TimeoutNotice {
            seat,
            action,
            seq,
            game_over,
        })
    }

    /// The move scripted for whichever seat is overdue in the current phase.
    fn fallback_action(&self) -> Option<(Seat, GameAction)> {
        let state = self.engine.state();
        match state.phase {
            Phase::Attack => {
                let index = first_attack_index(self.engine.hand(state.attacker))?;
                Some((state.attacker, GameAction::Attack { index }))
            }
            Phase::Defense => Some((state.defender, GameAction::Draw)),
            Phase::Rule8 {
                step: Rule8Step::AwaitingDrop,
            } => {
                let value = self
                    .engine
                    .hand(state.attacker)
                    .iter()
                    .map(|c| c.value())
                    .min()?;
                Some((state.attacker, GameAction::Rule8Drop { value }))
            }
            Phase::Rule8 {
                step: Rule8Step::AwaitingCrash,
            } => Some((state.defender, GameAction::Rule8Crash { crash: false })),
            Phase::GameOver => None,
        }
    }

    fn apply_to_engine(&mut self, seat: Seat, action: &GameAction) -> Result<(), DomainError> {
        match *action {
            GameAction::Attack { index } => self.engine.attack(seat, index),
            GameAction::Defend { i1, i2 } => self.engine.defend(seat, i1, i2),
            GameAction::Draw => self.engine.defender_draw(seat),
            GameAction::Rule8Drop { value } => self.engine.rule8_drop(seat, value),
            GameAction::Rule8Crash { crash } => self.engine.rule8_crash(seat, crash),
        }
    }

    /// Assign the next sequence number and append the record, best-effort.
    async fn log_move(
        &mut self,
        seat: Seat,
        action: GameAction,
        idempotency_key: Option<&str>,
        now: OffsetDateTime,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let snapshot = serde_json::to_value(self.view(seat)).unwrap_or(serde_json::Value::Null);
        let record = MoveRecord {
            session_id: self.id,
            seq,
            actor_seat: seat,
            action,
            idempotency_key: idempotency_key.map(str::to_owned),
            result_snapshot: snapshot,
            applied_at: now,
        };
        if let Err(err) = self.moves.append(record).await {
            warn!(session_id = %self.id, seq, %err, "move log append failed");
        }
        seq
    }

    fn game_over_info(&self) -> Option<GameOverInfo> {
        let state = self.engine.state();
        if !state.game_over {
            return None;
        }
        Some(GameOverInfo {
            winner_seat: state.winner?,
            win: state.win_kind?,
        })
    }

    // ---- pause / resume ----

    pub fn request_pause(&mut self, player_id: i64) -> Result<Seat, DomainError> {
        let seat = self.require_seat(player_id)?;
        if self.engine.state().game_over {
            return Err(DomainError::validation("the match already ended"));
        }
        if self.paused {
            return Err(DomainError::validation("the match is already paused"));
        }
        if self.pause_requested_by.is_some() {
            return Err(DomainError::validation("a pause request is already pending"));
        }
        self.pause_requested_by = Some(seat);
        Ok(seat)
    }

    /// Opponent's verdict on a pending pause request.
    pub fn resolve_pause(
        &mut self,
        player_id: i64,
        approve: bool,
    ) -> Result<PauseDecision, DomainError> {
        let seat = self.require_seat(player_id)?;
        let requester = self
            .pause_requested_by
            .ok_or_else(|| DomainError::validation("no pause request pending"))?;
        if seat == requester {
            return Err(DomainError::validation(
                "the requesting player cannot approve their own pause",
            ));
        }
        self.pause_requested_by = None;
        if approve {
            self.paused = true;
            Ok(PauseDecision::Paused)
        } else {
            Ok(PauseDecision::Rejected)
        }
    }

    /// Resume a paused match. Requires both seats connected; resets the
    /// shot clock.
    pub fn resume(&mut self, player_id: i64, now: OffsetDateTime) -> Result<(), DomainError> {
        self.require_seat(player_id)?;
        if !self.paused {
            return Err(DomainError::validation("the match is not paused"));
        }
        if !self.both_connected() {
            return Err(DomainError::validation(
                "both players must be connected to resume",
            ));
        }
        self.paused = false;
        self.turn_deadline = now + self.turn_duration;
        Ok(())
    }

    // ---- connection tracking ----

    pub fn mark_disconnected(&mut self, player_id: i64, now: OffsetDateTime) -> Option<Seat> {
        let seat = self.seat_of(player_id)?;
        let binding = &mut self.seats[seat as usize];
        binding.connected = false;
        binding.last_seen = now;
        Some(seat)
    }

    /// Mark the seat connected again; the caller resends the snapshot.
    pub fn reconnect(&mut self, player_id: i64, now: OffsetDateTime) -> Result<Seat, DomainError> {
        let seat = self.require_seat(player_id)?;
        let binding = &mut self.seats[seat as usize];
        binding.connected = true;
        binding.last_seen = now;
        Ok(seat)
    }

    fn require_seat(&self, player_id: i64) -> Result<Seat, DomainError> {
        self.seat_of(player_id).ok_or_else(|| {
            DomainError::not_in_room(format!("player {player_id} holds no seat in this match"))
        })
    }
}
