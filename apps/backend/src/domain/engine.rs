//! The sum-defense rule engine: a pure state machine over two hands and a
//! draw pile.
//!
//! All operations validate fully before mutating, return tagged
//! [`DomainError`]s on rule violations, and leave state untouched on every
//! error path. The engine is not thread-safe; callers serialize access
//! (one command in flight per session).
//!
//! Win conditions, in the order the engine evaluates them:
//! - **Escape**: on a successful defense that leaves the defender terminal.
//! - **Crazy Escape** then **Dealuxe**: on a failed defense (defender draw),
//!   in that precedence order, both inspecting the attacker.
//! - **Trail**: on an uncrashed Rule-8 round with a terminal attacker hand.

use crate::domain::cards::{Card, Deck};
use crate::domain::rules::{
    has_attack_card, is_attack_value, is_low_only, is_winner, SEATS,
};
use crate::domain::state::{GameEvent, GameState, Phase, Rule8Step, Seat, WinKind};
use crate::errors::domain::{DomainError, RuleViolation};

/// A deal must exceed the terminal hand size, or a game could open in a
/// state where no seat has a legal move.
pub const MIN_HAND_SIZE: u8 = 4;
pub const MAX_HAND_SIZE: u8 = 13;

pub struct GameEngine {
    deck: Deck,
    hands: [Vec<Card>; SEATS],
    discard: Vec<Card>,
    state: GameState,
}

impl GameEngine {
    /// Start a match: shuffle from `seed`, deal `hand_size` cards per seat
    /// alternately, then run the opening turn bookkeeping.
    pub fn new(seed: u64, hand_size: u8) -> Result<Self, DomainError> {
        if !(MIN_HAND_SIZE..=MAX_HAND_SIZE).contains(&hand_size) {
            return Err(DomainError::validation(format!(
                "hand size must be {MIN_HAND_SIZE}..={MAX_HAND_SIZE}, got {hand_size}"
            )));
        }

        let mut deck = Deck::shuffled(seed);
        let mut hands: [Vec<Card>; SEATS] = Default::default();
        for _ in 0..hand_size {
            for hand in hands.iter_mut() {
                if let Some(card) = deck.draw() {
                    hand.push(card);
                }
            }
        }

        let mut engine = Self {
            deck,
            hands,
            discard: Vec::new(),
            state: GameState::new(),
        };
        engine.start_turn();
        Ok(engine)
    }

    /// Assemble an engine from explicit parts. Used by fixtures and
    /// simulations; gameplay goes through [`GameEngine::new`].
    pub fn from_parts(hands: [Vec<Card>; SEATS], deck: Deck) -> Self {
        let mut engine = Self {
            deck,
            hands,
            discard: Vec::new(),
            state: GameState::new(),
        };
        engine.start_turn();
        engine
    }

    // ---- read accessors ----

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn hand(&self, seat: Seat) -> &[Card] {
        &self.hands[seat as usize]
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn discard_len(&self) -> usize {
        self.discard.len()
    }

    /// Total cards across deck, hands, discard, and the in-flight attack
    /// card. Equal to 52 for every engine built by [`GameEngine::new`].
    pub fn card_total(&self) -> usize {
        self.deck.len()
            + self.hands.iter().map(Vec::len).sum::<usize>()
            + self.discard.len()
            + usize::from(self.state.attack_card.is_some())
    }

    /// The seat expected to act in the current phase, if any.
    pub fn acting_seat(&self) -> Option<Seat> {
        match self.state.phase {
            Phase::Attack => Some(self.state.attacker),
            Phase::Defense => Some(self.state.defender),
            Phase::Rule8 {
                step: Rule8Step::AwaitingDrop,
            } => Some(self.state.attacker),
            Phase::Rule8 {
                step: Rule8Step::AwaitingCrash,
            } => Some(self.state.defender),
            Phase::GameOver => None,
        }
    }

    // ---- turn control ----

    /// Opening bookkeeping for an attack turn. No player input; never errors.
    ///
    /// Auto-enters the Rule-8 trail when the attacker cannot attack (no card
    /// valued 4-13), holds only low cards, and is not yet terminal
    /// (hand size > 3). A terminal-shaped attacker never reaches this point:
    /// each win condition fires inside the operation that produced it.
    pub fn start_turn(&mut self) {
        if self.state.game_over || self.state.phase != Phase::Attack {
            return;
        }
        let attacker = self.state.attacker;
        let hand = &self.hands[attacker as usize];
        if !has_attack_card(hand) && is_low_only(hand) && hand.len() > 3 {
            self.state.phase = Phase::Rule8 {
                step: Rule8Step::AwaitingDrop,
            };
            self.state.push_event(GameEvent::Rule8Entered { seat: attacker });
        }
    }

    // ---- attack phase ----

    pub fn attack(&mut self, seat: Seat, index: usize) -> Result<(), DomainError> {
        self.ensure_live()?;
        if self.state.phase != Phase::Attack {
            return Err(DomainError::rule(
                RuleViolation::InvalidPhase,
                format!("attack not valid in {}", self.state.phase.as_str()),
            ));
        }
        if seat != self.state.attacker {
            return Err(DomainError::not_your_turn("only the attacker may attack"));
        }

        let hand = &self.hands[seat as usize];
        if index >= hand.len() {
            return Err(DomainError::rule(
                RuleViolation::InvalidIndex,
                format!("index {index} out of bounds for hand of {}", hand.len()),
            ));
        }
        let card = hand[index];
        if !is_attack_value(card.value()) {
            return Err(DomainError::rule(
                RuleViolation::InvalidAttackCard,
                format!("cannot attack with {card}"),
            ));
        }

        self.state.clear_transients();
        self.hands[seat as usize].remove(index);
        self.state.attack_card = Some(card);
        self.state.phase = Phase::Defense;
        self.state.push_event(GameEvent::Attacked {
            seat,
            card_label: card.label(),
        });
        Ok(())
    }

    // ---- defense phase ----

    pub fn defend(&mut self, seat: Seat, i1: usize, i2: usize) -> Result<(), DomainError> {
        self.ensure_live()?;
        if self.state.phase != Phase::Defense {
            return Err(DomainError::rule(
                RuleViolation::InvalidPhase,
                format!("defend not valid in {}", self.state.phase.as_str()),
            ));
        }
        if seat != self.state.defender {
            return Err(DomainError::not_your_turn("only the defender may defend"));
        }

        let attack = self.require_attack_card()?;
        let hand = &self.hands[seat as usize];
        if i1 == i2 || i1 >= hand.len() || i2 >= hand.len() {
            return Err(DomainError::rule(
                RuleViolation::InvalidIndex,
                format!("defense indices ({i1}, {i2}) invalid for hand of {}", hand.len()),
            ));
        }
        let (c1, c2) = (hand[i1], hand[i2]);
        if c1.value() + c2.value() != attack.value() {
            return Err(DomainError::rule(
                RuleViolation::InvalidSum,
                format!("{c1} + {c2} does not sum to {attack}"),
            ));
        }

        self.state.clear_transients();
        // Remove the higher index first so the lower stays valid.
        let (hi, lo) = if i1 > i2 { (i1, i2) } else { (i2, i1) };
        let hand = &mut self.hands[seat as usize];
        let removed_hi = hand.remove(hi);
        let removed_lo = hand.remove(lo);
        self.discard.push(removed_hi);
        self.discard.push(removed_lo);
        self.discard.push(attack);
        self.state.attack_card = None;
        self.state.last_defense = Some([c1, c2]);
        self.state.push_event(GameEvent::Defended {
            seat,
            card_labels: [c1.label(), c2.label()],
        });

        // Escape Win: the defense itself ends the game; no role swap.
        if is_winner(&self.hands[seat as usize]) {
            self.finish(seat, WinKind::Escape);
            return Ok(());
        }

        self.state.swap_roles();
        self.state.phase = Phase::Attack;
        self.start_turn();
        Ok(())
    }

    /// Failed defense: the defender draws one card (silent no-op when the
    /// deck is exhausted), then the ordered win checks run.
    pub fn defender_draw(&mut self, seat: Seat) -> Result<(), DomainError> {
        self.ensure_live()?;
        if self.state.phase != Phase::Defense {
            return Err(DomainError::rule(
                RuleViolation::InvalidPhase,
                format!("draw not valid in {}", self.state.phase.as_str()),
            ));
        }
        if seat != self.state.defender {
            return Err(DomainError::not_your_turn("only the defender may draw"));
        }
        let attack = self.require_attack_card()?;

        self.state.clear_transients();
        if let Some(card) = self.deck.draw() {
            self.hands[seat as usize].push(card);
            self.state.last_drawn = Some((seat, card));
        }
        self.state.push_event(GameEvent::Drew { seat });

        let attacker = self.state.attacker;
        self.discard.push(attack);
        self.state.attack_card = None;

        // Crazy Escape takes precedence over Dealuxe; both inspect the
        // seat that attacked.
        if self.hands[attacker as usize].is_empty() && is_attack_value(attack.value()) {
            self.finish(attacker, WinKind::CrazyEscape);
            return Ok(());
        }
        if is_winner(&self.hands[attacker as usize]) {
            self.finish(attacker, WinKind::Dealuxe);
            return Ok(());
        }

        // Defense failed: attacker keeps the turn.
        self.state.phase = Phase::Attack;
        self.start_turn();
        Ok(())
    }

    // ---- rule 8 trail ----

    pub fn rule8_drop(&mut self, seat: Seat, value: u8) -> Result<(), DomainError> {
        self.ensure_live()?;
        if self.state.phase
            != (Phase::Rule8 {
                step: Rule8Step::AwaitingDrop,
            })
        {
            return Err(DomainError::rule(
                RuleViolation::InvalidPhase,
                "trail drop only valid while awaiting a drop",
            ));
        }
        if seat != self.state.attacker {
            return Err(DomainError::not_your_turn("only the attacker may drop"));
        }

        let hand = &self.hands[seat as usize];
        let Some(pos) = hand.iter().position(|c| c.value() == value) else {
            return Err(DomainError::rule(
                RuleViolation::NoSuchCard,
                format!("no card of value {value} to drop"),
            ));
        };

        self.state.clear_transients();
        let dropped = self.hands[seat as usize].remove(pos);
        self.discard.push(dropped);
        self.state.trail_value = Some(value);
        self.state.phase = Phase::Rule8 {
            step: Rule8Step::AwaitingCrash,
        };
        self.state.push_event(GameEvent::TrailDropped { seat, value });
        Ok(())
    }

    /// Defender's crash decision. A crash is only honored when the defender
    /// actually holds a card matching the trail value; otherwise the trail
    /// continues and the Trail Win check runs.
    pub fn rule8_crash(&mut self, seat: Seat, crash: bool) -> Result<(), DomainError> {
        self.ensure_live()?;
        if self.state.phase
            != (Phase::Rule8 {
                step: Rule8Step::AwaitingCrash,
            })
        {
            return Err(DomainError::rule(
                RuleViolation::InvalidPhase,
                "crash decision only valid while awaiting one",
            ));
        }
        if seat != self.state.defender {
            return Err(DomainError::not_your_turn(
                "only the defender decides a crash",
            ));
        }
        let trail = self.state.trail_value.ok_or_else(|| {
            DomainError::validation("Invariant violated: trail_value must be set (rule8_crash)")
        })?;

        self.state.clear_transients();
        let defender_holds = self.hands[seat as usize].iter().any(|c| c.value() == trail);
        if crash && defender_holds {
            // Trail interrupted: attacker pays with a draw, play resumes.
            let attacker = self.state.attacker;
            if let Some(card) = self.deck.draw() {
                self.hands[attacker as usize].push(card);
                self.state.last_drawn = Some((attacker, card));
            }
            self.state.push_event(GameEvent::TrailCrashed { seat });
            // With the deck exhausted the crash cannot refill the attacker;
            // a terminal-shaped hand would otherwise be stuck in a turn
            // where no legal move exists.
            if is_winner(&self.hands[attacker as usize]) {
                self.finish(attacker, WinKind::Trail);
                return Ok(());
            }
            self.state.trail_value = None;
            self.state.phase = Phase::Attack;
            self.start_turn();
            return Ok(());
        }

        self.state.push_event(GameEvent::TrailContinued { seat });
        if is_winner(&self.hands[self.state.attacker as usize]) {
            let attacker = self.state.attacker;
            self.finish(attacker, WinKind::Trail);
            return Ok(());
        }

        self.state.trail_value = None;
        self.state.phase = Phase::Rule8 {
            step: Rule8Step::AwaitingDrop,
        };
        Ok(())
    }

    // ---- internals ----

    fn ensure_live(&self) -> Result<(), DomainError> {
        if self.state.game_over {
            return Err(DomainError::rule(
                RuleViolation::GameAlreadyOver,
                "the match already ended",
            ));
        }
        Ok(())
    }

    fn require_attack_card(&self) -> Result<Card, DomainError> {
        self.state.attack_card.ok_or_else(|| {
            DomainError::validation("Invariant violated: attack_card must be set in DEFENSE")
        })
    }

    fn finish(&mut self, winner: Seat, win: WinKind) {
        self.state.game_over = true;
        self.state.winner = Some(winner);
        self.state.win_kind = Some(win);
        self.state.trail_value = None;
        self.state.phase = Phase::GameOver;
        self.state.push_event(GameEvent::Won { seat: winner, win });
    }
}
