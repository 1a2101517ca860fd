//! Clock seam so deadline and expiry logic is testable without sleeping.

use std::sync::Arc;

use parking_lot::RwLock;
use time::OffsetDateTime;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Hand-advanced clock for tests.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<RwLock<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn advance(&self, by: time::Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        *self.now.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read()
    }
}
