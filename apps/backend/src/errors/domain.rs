//! Domain-level error type used across the engine, sessions, and rooms.
//!
//! Every rule violation on a well-formed command is a soft failure: the
//! engine returns one of these without mutating state, and the ws layer
//! forwards it as a user-visible `error` event without tearing down the
//! session or the connection.

use thiserror::Error;

/// Rule-engine violation kinds. One tagged kind per rejectable condition,
/// so callers and tests can match without string inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuleViolation {
    /// Operation not valid in the current phase.
    InvalidPhase,
    /// Card index outside the acting hand.
    InvalidIndex,
    /// Attack card value outside 4..=13.
    InvalidAttackCard,
    /// Defense pair does not sum to the attack card value.
    InvalidSum,
    /// No card of the requested value to drop.
    NoSuchCard,
    /// The match already reached a terminal state.
    GameAlreadyOver,
}

/// Central domain error type.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum DomainError {
    #[error("rule violation {kind:?}: {detail}")]
    Rule { kind: RuleViolation, detail: String },

    #[error("not your turn: {0}")]
    NotYourTurn(String),

    #[error("not in room: {0}")]
    NotInRoom(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("infra error: {0}")]
    Infra(String),
}

impl DomainError {
    pub fn rule(kind: RuleViolation, detail: impl Into<String>) -> Self {
        Self::Rule {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_your_turn(detail: impl Into<String>) -> Self {
        Self::NotYourTurn(detail.into())
    }

    pub fn not_in_room(detail: impl Into<String>) -> Self {
        Self::NotInRoom(detail.into())
    }

    pub fn room_not_found(code: impl Into<String>) -> Self {
        Self::RoomNotFound(code.into())
    }

    pub fn session_not_found(detail: impl Into<String>) -> Self {
        Self::SessionNotFound(detail.into())
    }

    pub fn insufficient_balance(detail: impl Into<String>) -> Self {
        Self::InsufficientBalance(detail.into())
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    pub fn infra(detail: impl Into<String>) -> Self {
        Self::Infra(detail.into())
    }

    /// The rule-violation kind, if this is a rule error.
    pub fn rule_kind(&self) -> Option<RuleViolation> {
        match self {
            Self::Rule { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
