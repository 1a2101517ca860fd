use std::sync::Arc;

use crate::config::GameConfig;
use crate::infra::{Clock, SystemClock};
use crate::services::rooms::RoomCoordinator;
use crate::store::{InMemoryMoveStore, InMemoryWallet};
use crate::ws::WsHub;

/// Process-wide shared state handed to every request and ws actor.
pub struct AppState {
    coordinator: Arc<RoomCoordinator>,
    hub: Arc<WsHub>,
}

impl AppState {
    pub fn new(coordinator: Arc<RoomCoordinator>, hub: Arc<WsHub>) -> Self {
        Self { coordinator, hub }
    }

    /// Default production wiring: in-memory stores, wall clock, env config.
    pub fn from_env() -> Self {
        let coordinator = RoomCoordinator::new(
            Arc::new(InMemoryMoveStore::new()),
            Arc::new(InMemoryWallet::new()),
            Arc::new(SystemClock) as Arc<dyn Clock>,
            GameConfig::from_env(),
        );
        Self::new(Arc::new(coordinator), Arc::new(WsHub::new()))
    }

    pub fn coordinator(&self) -> Arc<RoomCoordinator> {
        self.coordinator.clone()
    }

    pub fn hub(&self) -> Arc<WsHub> {
        self.hub.clone()
    }
}
