//! Configuration module.
//!
//! Loads connection and pool settings from environment variables.

mod connection;
mod pool;

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub use connection::ConnectionConfig;
pub use pool::{PoolConfig, ReconnectPolicy};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name the pool is registered under.
    pub pool_name: String,

    pub connection: ConnectionConfig,
    pub pool: PoolConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = ConnectionConfig::default();
        let connection = ConnectionConfig {
            host: env::var("MONGODB_HOST").unwrap_or(defaults.host),
            port: parse_var("MONGODB_PORT").unwrap_or(defaults.port),
            username: env::var("MONGODB_USERNAME").unwrap_or_default(),
            password: env::var("MONGODB_PASSWORD").unwrap_or_default(),
            database: env::var("MONGODB_DATABASE").unwrap_or(defaults.database),
            replica_set: env::var("MONGODB_REPLICA_SET")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        };

        let mut pool = PoolConfig::default();
        if let Some(size) = parse_var::<usize>("MONGODB_POOL_SIZE").filter(|s| *s > 0) {
            pool.max_size = size;
        }
        if let Some(ms) = parse_var("MONGODB_ACQUIRE_TIMEOUT_MS") {
            pool.acquire_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var("MONGODB_RECONNECT_ATTEMPTS") {
            pool.reconnect.max_attempts = attempts;
        }
        if let Some(ms) = parse_var("MONGODB_RECONNECT_BACKOFF_MS") {
            pool.reconnect.initial_backoff = Duration::from_millis(ms);
        }

        Self {
            pool_name: env::var("MONGODB_POOL_NAME").unwrap_or_else(|_| "mongo".to_string()),
            connection,
            pool,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
