//! Websocket frame vocabulary. Every frame is a JSON object tagged by
//! `type`; game state travels as pre-masked JSON values so a frame never
//! contains more than its recipient is allowed to see.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::state::{GameAction, GameEvent, Seat, WinKind};
use crate::errors::DomainError;
use crate::services::rooms::RoomSummary;
use crate::store::BetType;

pub const PROTOCOL_VERSION: u32 = 1;

/// Client-to-server frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Must be the first frame on a connection.
    Hello { protocol: u32, player_id: i64 },
    GetLobby,
    CreateRoom {
        card_count: Option<u8>,
        bet_amount: i64,
        bet_type: BetType,
    },
    JoinRoom {
        room_code: String,
    },
    GameAction {
        room_code: String,
        #[serde(flatten)]
        action: GameAction,
        idempotency_key: Option<String>,
    },
    RequestPause {
        room_code: String,
    },
    ApprovePause {
        room_code: String,
        approve: bool,
    },
    ResumeGame {
        room_code: String,
    },
    ReconnectToRoom {
        room_code: String,
    },
}

/// Server-to-client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Connected {
        protocol: u32,
        player_id: i64,
    },
    LobbyData {
        rooms: Vec<RoomSummary>,
    },
    /// Nudge: re-fetch the lobby.
    LobbyUpdated,
    RoomCreated {
        room: RoomSummary,
    },
    RoomJoined {
        room: RoomSummary,
    },
    OpponentJoined {
        room_code: String,
        player_id: i64,
    },
    GameStarting {
        room_code: String,
        countdown_secs: u64,
    },
    /// Also used to rehydrate a reconnecting player.
    GameStarted {
        room_code: String,
        your_seat: Seat,
        your_turn: bool,
        state: serde_json::Value,
        #[serde(with = "time::serde::rfc3339")]
        turn_deadline: OffsetDateTime,
    },
    GameUpdate {
        room_code: String,
        state: serde_json::Value,
        actor_seat: Seat,
        is_my_turn: bool,
        action: GameAction,
        result: Option<GameEvent>,
        #[serde(with = "time::serde::rfc3339")]
        turn_deadline: OffsetDateTime,
    },
    /// A scripted move was applied for an overdue seat.
    TurnTimeout {
        room_code: String,
        seat: Seat,
        action: GameAction,
        state: serde_json::Value,
        is_my_turn: bool,
        #[serde(with = "time::serde::rfc3339")]
        turn_deadline: OffsetDateTime,
    },
    PauseRequested {
        room_code: String,
        seat: Seat,
    },
    PauseRequestSent {
        room_code: String,
    },
    PauseRejected {
        room_code: String,
    },
    GamePaused {
        room_code: String,
    },
    GameResumed {
        room_code: String,
        state: serde_json::Value,
        is_my_turn: bool,
        #[serde(with = "time::serde::rfc3339")]
        turn_deadline: OffsetDateTime,
    },
    OpponentDisconnected {
        room_code: String,
        seat: Seat,
        reconnect_window_secs: u64,
    },
    OpponentReconnected {
        room_code: String,
        seat: Seat,
    },
    GameOver {
        room_code: String,
        winner_seat: Seat,
        win: WinKind,
        state: serde_json::Value,
        prize_pool: i64,
    },
    GameOverPersonal {
        room_code: String,
        new_balance: i64,
        winnings_awarded: i64,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RuleViolation,
    NotYourTurn,
    NotInRoom,
    RoomNotFound,
    SessionNotFound,
    InsufficientBalance,
    BadRequest,
    Internal,
}

impl From<&DomainError> for ErrorCode {
    fn from(err: &DomainError) -> Self {
        match err {
            DomainError::Rule { .. } => ErrorCode::RuleViolation,
            DomainError::NotYourTurn(_) => ErrorCode::NotYourTurn,
            DomainError::NotInRoom(_) => ErrorCode::NotInRoom,
            DomainError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            DomainError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            DomainError::InsufficientBalance(_) => ErrorCode::InsufficientBalance,
            DomainError::Validation(_) => ErrorCode::BadRequest,
            _ => ErrorCode::Internal,
        }
    }
}

impl ServerMsg {
    pub fn error(err: &DomainError) -> Self {
        ServerMsg::Error {
            code: ErrorCode::from(err),
            message: err.to_string(),
        }
    }
}
