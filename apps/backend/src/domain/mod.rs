//! Pure game logic: no IO, no clocks, no async. Everything above this layer
//! (sessions, rooms, the ws surface) drives the engine through these types.

pub mod cards;
pub mod engine;
pub mod fixtures;
pub mod player_view;
pub mod rules;
pub mod state;

pub use cards::{Card, Deck, Rank, Suit};
pub use engine::GameEngine;
pub use player_view::PlayerView;
pub use state::{opponent, GameAction, GameEvent, GameState, Phase, Rule8Step, Seat, WinKind};
