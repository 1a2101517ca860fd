//! Append-only move log with idempotency-key lookup.
//!
//! The in-memory adapter is the only one shipped; the trait is async so a
//! database-backed adapter can slot in without touching the services.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::state::{GameAction, Seat};
use crate::errors::DomainError;

/// One applied move, exactly as it was accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    pub session_id: Uuid,
    /// Contiguous from 1 within a session.
    pub seq: u64,
    pub actor_seat: Seat,
    pub action: GameAction,
    pub idempotency_key: Option<String>,
    /// The actor's masked view right after the move applied; replayed
    /// verbatim on a duplicate submission.
    pub result_snapshot: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
}

#[async_trait]
pub trait MoveStore: Send + Sync {
    async fn append(&self, record: MoveRecord) -> Result<(), DomainError>;

    async fn find_by_idempotency_key(
        &self,
        session_id: Uuid,
        key: &str,
    ) -> Result<Option<MoveRecord>, DomainError>;

    async fn last_seq(&self, session_id: Uuid) -> Result<u64, DomainError>;

    async fn moves_for_session(&self, session_id: Uuid) -> Result<Vec<MoveRecord>, DomainError>;
}

#[derive(Default)]
pub struct InMemoryMoveStore {
    by_session: RwLock<HashMap<Uuid, Vec<MoveRecord>>>,
}

impl InMemoryMoveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MoveStore for InMemoryMoveStore {
    async fn append(&self, record: MoveRecord) -> Result<(), DomainError> {
        let mut map = self.by_session.write();
        let moves = map.entry(record.session_id).or_default();
        if let Some(last) = moves.last() {
            if record.seq != last.seq + 1 {
                return Err(DomainError::infra(format!(
                    "non-contiguous seq {} after {}",
                    record.seq, last.seq
                )));
            }
        } else if record.seq != 1 {
            return Err(DomainError::infra(format!(
                "first move must have seq 1, got {}",
                record.seq
            )));
        }
        moves.push(record);
        Ok(())
    }

    async fn find_by_idempotency_key(
        &self,
        session_id: Uuid,
        key: &str,
    ) -> Result<Option<MoveRecord>, DomainError> {
        let map = self.by_session.read();
        Ok(map.get(&session_id).and_then(|moves| {
            moves
                .iter()
                .find(|m| m.idempotency_key.as_deref() == Some(key))
                .cloned()
        }))
    }

    async fn last_seq(&self, session_id: Uuid) -> Result<u64, DomainError> {
        let map = self.by_session.read();
        Ok(map
            .get(&session_id)
            .and_then(|moves| moves.last())
            .map(|m| m.seq)
            .unwrap_or(0))
    }

    async fn moves_for_session(&self, session_id: Uuid) -> Result<Vec<MoveRecord>, DomainError> {
        let map = self.by_session.read();
        Ok(map.get(&session_id).cloned().unwrap_or_default())
    }
}
