//! Deterministic builders for engine tests. Compiled into the crate so both
//! unit tests and the integration suite can share them.

use crate::domain::cards::{Card, Deck, Rank, Suit};
use crate::domain::engine::GameEngine;

const SUIT_CYCLE: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

/// Build cards from values, cycling suits so duplicates stay distinct cards.
///
/// # Panics
/// Panics on a value outside 1..=13. Test-only input.
pub fn cards_of_values(values: &[u8]) -> Vec<Card> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| Card {
            rank: Rank::from_value(v).unwrap_or_else(|| panic!("bad card value {v}")),
            suit: SUIT_CYCLE[i % SUIT_CYCLE.len()],
        })
        .collect()
}

/// Engine with scripted hands and draw pile. Deck values are drawn in
/// reverse order (last listed is drawn first).
pub fn engine_with_hands(attacker: &[u8], defender: &[u8], deck: &[u8]) -> GameEngine {
    GameEngine::from_parts(
        [cards_of_values(attacker), cards_of_values(defender)],
        Deck::from_cards(cards_of_values(deck)),
    )
}

/// Values of a hand, in hand order.
pub fn values_of(hand: &[Card]) -> Vec<u8> {
    hand.iter().map(|c| c.value()).collect()
}
