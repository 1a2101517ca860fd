#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod config;
pub mod domain;
pub mod errors;
pub mod health;
pub mod infra;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod utils;
pub mod ws;

#[cfg(test)]
pub mod test_bootstrap;

// Re-exports for public API
pub use config::GameConfig;
pub use domain::{GameAction, GameEngine, PlayerView};
pub use errors::{DomainError, RuleViolation};
pub use services::{RoomCoordinator, TurnSession};
pub use state::AppState;

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    test_bootstrap::logging::init();
}
