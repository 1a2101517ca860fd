//! Hand-shape predicates shared by the engine and the timeout fallback logic.

use std::ops::RangeInclusive;

use crate::domain::cards::Card;

pub const SEATS: usize = 2;

/// Cards that may open an attack.
pub const ATTACK_VALUES: RangeInclusive<u8> = 4..=13;

/// Highest card value still counted as "low" for the terminal hand shape.
pub const LOW_VALUE_MAX: u8 = 3;

pub fn is_attack_value(value: u8) -> bool {
    ATTACK_VALUES.contains(&value)
}

pub fn is_low_only(hand: &[Card]) -> bool {
    hand.iter().all(|c| c.value() <= LOW_VALUE_MAX)
}

pub fn has_attack_card(hand: &[Card]) -> bool {
    hand.iter().any(|c| is_attack_value(c.value()))
}

/// Index of the first card able to open an attack, if any.
pub fn first_attack_index(hand: &[Card]) -> Option<usize> {
    hand.iter().position(|c| is_attack_value(c.value()))
}

/// The terminal low-card shape: at most three cards, all valued 1-3.
///
/// Every one of the four win conditions reduces to this predicate on one
/// seat's hand; which seat, and when it is checked, is what distinguishes
/// Escape, Crazy Escape, Dealuxe, and Trail wins.
pub fn is_winner(hand: &[Card]) -> bool {
    hand.len() <= 3 && is_low_only(hand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::cards_of_values;

    #[test]
    fn winner_requires_both_size_and_low_values() {
        assert!(is_winner(&cards_of_values(&[1, 2, 3])));
        assert!(is_winner(&cards_of_values(&[1])));
        assert!(is_winner(&[]));
        // Low-only but too many cards.
        assert!(!is_winner(&cards_of_values(&[1, 2, 2, 3])));
        // Small enough but holds an attack card.
        assert!(!is_winner(&cards_of_values(&[1, 2, 4])));
    }

    #[test]
    fn attack_capability_detection() {
        assert!(has_attack_card(&cards_of_values(&[1, 2, 13])));
        assert!(!has_attack_card(&cards_of_values(&[1, 2, 3])));
        assert_eq!(first_attack_index(&cards_of_values(&[2, 3, 8, 9])), Some(2));
        assert_eq!(first_attack_index(&cards_of_values(&[1, 1])), None);
    }

    #[test]
    fn attack_values_are_4_to_13() {
        assert!(!is_attack_value(3));
        assert!(is_attack_value(4));
        assert!(is_attack_value(13));
    }
}
