//! Server configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! Every knob has a typed default, so a missing or unparsable variable never
//! stops the server from starting. `DATABASE_URL` is the only optional value:
//! without it game records are dropped instead of stored.

use std::path::PathBuf;
use std::time::Duration;

use crate::state::GameSettings;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CLOCK_SECONDS: u32 = 300;
const DEFAULT_CLOCK_TICK_MS: u64 = 1000;
const DEFAULT_GAME_RECORD_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Directory served for any path not matched by a route.
    pub static_dir: PathBuf,
    /// Bounded capacity of the game record queue.
    pub record_queue_capacity: usize,
    pub game: GameSettings,
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
        let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| DEFAULT_STATIC_DIR.into());

        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            static_dir: PathBuf::from(static_dir),
            record_queue_capacity: env_parse("GAME_RECORD_QUEUE_CAPACITY", DEFAULT_GAME_RECORD_QUEUE_CAPACITY).max(1),
            game: GameSettings {
                clock_seconds: env_parse("CLOCK_SECONDS", DEFAULT_CLOCK_SECONDS),
                tick: Duration::from_millis(env_parse("CLOCK_TICK_MS", DEFAULT_CLOCK_TICK_MS).max(1)),
                client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY).max(1),
            },
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when the
/// variable is unset or does not parse.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
