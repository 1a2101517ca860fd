//! Persistence boundaries. Traits are async and object-safe; the shipped
//! adapters are in-memory.

pub mod moves;
pub mod wallet;

pub use moves::{InMemoryMoveStore, MoveRecord, MoveStore};
pub use wallet::{BetTerms, BetType, InMemoryWallet, MatchResult, WalletStore};
