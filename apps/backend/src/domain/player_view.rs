//! Per-seat masked projection of engine state, the only shape clients see.

use serde::Serialize;

use crate::domain::cards::{Card, Rank, Suit};
use crate::domain::engine::GameEngine;
use crate::domain::rules::SEATS;
use crate::domain::state::{GameEvent, Phase, Rule8Step, Seat, WinKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub rank: Rank,
    pub suit: Suit,
    pub value: u8,
    pub label: String,
}

impl From<Card> for CardView {
    fn from(card: Card) -> Self {
        Self {
            rank: card.rank,
            suit: card.suit,
            value: card.value(),
            label: card.label(),
        }
    }
}

/// A seat as the viewer sees it: full cards for their own seat (and both
/// seats once the game is over), a bare count for a live opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SeatView {
    Hand { hand: Vec<CardView> },
    HandCount { hand_count: usize },
}

/// Everything one seat is allowed to know about the match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule8_step: Option<Rule8Step>,
    pub attacker: Seat,
    pub defender: Seat,
    pub attack_card: Option<CardView>,
    pub trail_value: Option<u8>,
    pub game_over: bool,
    pub winner: Option<Seat>,
    pub win_kind: Option<WinKind>,
    pub deck_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_defense: Option<[CardView; 2]>,
    /// The card the viewer themselves just drew; never present for the
    /// opponent's draws.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_drawn: Option<CardView>,
    pub log: Vec<GameEvent>,
    pub players: [SeatView; SEATS],
}

impl PlayerView {
    /// Project the engine state for one viewer seat.
    pub fn project(engine: &GameEngine, viewer: Seat) -> Self {
        let state = engine.state();
        let reveal_all = state.game_over;

        let players = std::array::from_fn(|seat| {
            let hand = engine.hand(seat as Seat);
            if reveal_all || seat as Seat == viewer {
                SeatView::Hand {
                    hand: hand.iter().copied().map(CardView::from).collect(),
                }
            } else {
                SeatView::HandCount {
                    hand_count: hand.len(),
                }
            }
        });

        let rule8_step = match state.phase {
            Phase::Rule8 { step } => Some(step),
            _ => None,
        };

        Self {
            phase: state.phase.as_str(),
            rule8_step,
            attacker: state.attacker,
            defender: state.defender,
            attack_card: state.attack_card.map(CardView::from),
            trail_value: state.trail_value,
            game_over: state.game_over,
            winner: state.winner,
            win_kind: state.win_kind,
            deck_len: engine.deck_len(),
            last_defense: state.last_defense.map(|[a, b]| [a.into(), b.into()]),
            last_drawn: state
                .last_drawn
                .filter(|(seat, _)| *seat == viewer)
                .map(|(_, card)| card.into()),
            log: state.log().to_vec(),
            players,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::engine_with_hands;

    #[test]
    fn opponent_hand_is_masked_to_a_count() {
        let engine = engine_with_hands(&[2, 8], &[5, 5, 4], &[]);
        let view = PlayerView::project(&engine, 0);
        assert!(matches!(&view.players[0], SeatView::Hand { hand } if hand.len() == 2));
        assert!(matches!(view.players[1], SeatView::HandCount { hand_count: 3 }));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["players"][1]["hand"].is_null());
        assert_eq!(json["players"][1]["hand_count"], 3);
    }

    #[test]
    fn own_draw_is_visible_only_to_the_drawer() {
        let mut engine = engine_with_hands(&[8, 9], &[4, 4], &[6]);
        engine.attack(0, 0).unwrap();
        engine.defender_draw(1).unwrap();

        let drawer = PlayerView::project(&engine, 1);
        assert_eq!(drawer.last_drawn.map(|c| c.value), Some(6));
        let other = PlayerView::project(&engine, 0);
        assert_eq!(other.last_drawn, None);
    }

    #[test]
    fn both_hands_revealed_after_game_over() {
        let mut engine = engine_with_hands(&[8, 9], &[3, 5, 1], &[]);
        engine.attack(0, 0).unwrap();
        engine.defend(1, 0, 1).unwrap();
        assert!(engine.state().game_over);

        let view = PlayerView::project(&engine, 0);
        assert!(matches!(view.players[1], SeatView::Hand { .. }));
        assert_eq!(view.winner, Some(1));
    }

    #[test]
    fn rule8_step_surfaces_in_the_view() {
        let engine = engine_with_hands(&[1, 2, 2, 3], &[9, 9], &[]);
        let view = PlayerView::project(&engine, 0);
        assert_eq!(view.phase, "RULE_8");
        assert_eq!(view.rule8_step, Some(Rule8Step::AwaitingDrop));
    }
}
