//! Orchestration between the pure engine and the transport: per-match
//! sessions and the room registry.

pub mod rooms;
pub mod session;

pub use rooms::{Audience, Outbound, RoomCoordinator, RoomStatus, RoomSummary};
pub use session::{AppliedAction, ApplyOutcome, PauseDecision, TurnSession};
