//! Game tuning knobs, read once at startup from the environment.

use std::env;

use time::Duration;

/// Defaults match the historical deployment values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Per-turn shot clock.
    pub turn_secs: u64,
    /// Lobby countdown between the second join and the first deal.
    pub countdown_secs: u64,
    /// Cards dealt per seat.
    pub card_count: u8,
    /// How long a waiting room stays listed in the lobby.
    pub lobby_window: Duration,
    /// Grace period for a dropped player before forfeiture handling.
    pub reconnect_window_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_secs: 300,
            countdown_secs: 3,
            card_count: 6,
            lobby_window: Duration::hours(5),
            reconnect_window_secs: 120,
        }
    }
}

impl GameConfig {
    /// Read overrides from `DEALUXE_*` env vars; unset or unparsable values
    /// fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            turn_secs: env_parse("DEALUXE_TURN_SECS").unwrap_or(defaults.turn_secs),
            countdown_secs: env_parse("DEALUXE_COUNTDOWN_SECS").unwrap_or(defaults.countdown_secs),
            card_count: env_parse("DEALUXE_CARD_COUNT").unwrap_or(defaults.card_count),
            lobby_window: env_parse("DEALUXE_LOBBY_WINDOW_HOURS")
                .map(Duration::hours)
                .unwrap_or(defaults.lobby_window),
            reconnect_window_secs: env_parse("DEALUXE_RECONNECT_WINDOW_SECS")
                .unwrap_or(defaults.reconnect_window_secs),
        }
    }

    pub fn turn_duration(&self) -> Duration {
        Duration::seconds(self.turn_secs as i64)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = GameConfig::default();
        assert_eq!(config.turn_secs, 300);
        assert_eq!(config.card_count, 6);
        assert_eq!(config.lobby_window, Duration::hours(5));
    }
}
