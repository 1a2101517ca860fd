//! Game-state container and the phase/event vocabulary of the rule engine.

use serde::{Deserialize, Serialize};

use crate::domain::cards::Card;

/// One of the two fixed player slots in a match.
pub type Seat = u8; // 0 or 1

pub fn opponent(seat: Seat) -> Seat {
    1 - seat
}

/// Nested sub-state of the Rule-8 trail, making the repeated
/// drop/crash round-trips explicit.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule8Step {
    /// Attacker must shed one low card.
    AwaitingDrop,
    /// Defender must decide whether to crash the trail.
    AwaitingCrash,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    /// Attacker must play a card valued 4-13.
    Attack,
    /// Defender must answer the attack (defend or draw).
    Defense,
    /// The trail sub-protocol for an all-low attacker hand.
    Rule8 { step: Rule8Step },
    /// Terminal.
    GameOver,
}

impl Phase {
    /// Wire name, matching the historical client strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Attack => "ATTACK",
            Phase::Defense => "DEFENSE",
            Phase::Rule8 { .. } => "RULE_8",
            Phase::GameOver => "GAME_OVER",
        }
    }
}

/// Which of the four win conditions ended the game.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinKind {
    /// Defender fully defended down to the terminal shape; no role swap.
    Escape,
    /// Attacker emptied their hand on the attack and the defender then drew.
    CrazyEscape,
    /// Defender drew while the attacker already held the terminal shape.
    Dealuxe,
    /// Attacker shed the trail down to the terminal shape uncrashed.
    Trail,
}

/// Client-submitted (or timeout-scripted) game action.
///
/// Adjacent tagging keeps the wire shape `{"action": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum GameAction {
    Attack { index: usize },
    Defend { i1: usize, i2: usize },
    Draw,
    Rule8Drop { value: u8 },
    Rule8Crash { crash: bool },
}

impl GameAction {
    pub fn kind(&self) -> &'static str {
        match self {
            GameAction::Attack { .. } => "attack",
            GameAction::Defend { .. } => "defend",
            GameAction::Draw => "draw",
            GameAction::Rule8Drop { .. } => "rule8_drop",
            GameAction::Rule8Crash { .. } => "rule8_crash",
        }
    }
}

/// Public record of something that happened, rendered in client event feeds.
///
/// Events never carry hidden information: a draw names the seat, not the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Attacked { seat: Seat, card_label: String },
    Defended { seat: Seat, card_labels: [String; 2] },
    Drew { seat: Seat },
    Rule8Entered { seat: Seat },
    TrailDropped { seat: Seat, value: u8 },
    TrailCrashed { seat: Seat },
    TrailContinued { seat: Seat },
    Won { seat: Seat, win: WinKind },
}

/// Entries kept in the rolling event log.
const EVENT_LOG_CAP: usize = 32;

/// Mutable match state owned by the engine.
///
/// Invariants upheld by the engine:
/// - `attacker != defender` always;
/// - `attack_card` is `Some` exactly while in `Defense`;
/// - `trail_value` is `Some` exactly while in `Rule8 { AwaitingCrash }`;
/// - `winner` is `Some` iff `game_over`.
#[derive(Debug, Clone)]
pub struct GameState {
    pub phase: Phase,
    pub attacker: Seat,
    pub defender: Seat,
    pub attack_card: Option<Card>,
    pub trail_value: Option<u8>,
    pub game_over: bool,
    pub winner: Option<Seat>,
    pub win_kind: Option<WinKind>,
    /// Cards spent by the most recent successful defense (transient).
    pub last_defense: Option<[Card; 2]>,
    /// Card drawn by the most recent draw, with the drawing seat (transient,
    /// masked to that seat in projections).
    pub last_drawn: Option<(Seat, Card)>,
    log: Vec<GameEvent>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Attack,
            attacker: 0,
            defender: 1,
            attack_card: None,
            trail_value: None,
            game_over: false,
            winner: None,
            win_kind: None,
            last_defense: None,
            last_drawn: None,
            log: Vec::new(),
        }
    }

    pub fn swap_roles(&mut self) {
        std::mem::swap(&mut self.attacker, &mut self.defender);
    }

    pub fn push_event(&mut self, event: GameEvent) {
        if self.log.len() == EVENT_LOG_CAP {
            self.log.remove(0);
        }
        self.log.push(event);
    }

    pub fn log(&self) -> &[GameEvent] {
        &self.log
    }

    pub fn last_event(&self) -> Option<&GameEvent> {
        self.log.last()
    }

    /// Clear per-action transient fields before the next mutation.
    pub fn clear_transients(&mut self) {
        self.last_defense = None;
        self.last_drawn = None;
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_is_complementary() {
        assert_eq!(opponent(0), 1);
        assert_eq!(opponent(1), 0);
    }

    #[test]
    fn swap_roles_keeps_seats_distinct() {
        let mut state = GameState::new();
        assert_eq!((state.attacker, state.defender), (0, 1));
        state.swap_roles();
        assert_eq!((state.attacker, state.defender), (1, 0));
        assert_ne!(state.attacker, state.defender);
    }

    #[test]
    fn event_log_is_bounded() {
        let mut state = GameState::new();
        for _ in 0..100 {
            state.push_event(GameEvent::Drew { seat: 0 });
        }
        assert_eq!(state.log().len(), EVENT_LOG_CAP);
    }

    #[test]
    fn game_action_wire_shape_is_adjacent() {
        let json = serde_json::to_value(GameAction::Attack { index: 2 }).unwrap();
        assert_eq!(json["action"], "attack");
        assert_eq!(json["data"]["index"], 2);

        let draw = serde_json::to_value(GameAction::Draw).unwrap();
        assert_eq!(draw["action"], "draw");

        let parsed: GameAction =
            serde_json::from_str(r#"{"action":"defend","data":{"i1":0,"i2":1}}"#).unwrap();
        assert_eq!(parsed, GameAction::Defend { i1: 0, i2: 1 });
    }
}
