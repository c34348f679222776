//! Mongo Pool - pooled MongoDB client facade.
//!
//! Hides connection setup, health checks and reconnection behind a small
//! CRUD and aggregate API, and returns every borrowed connection to its pool
//! exactly once.
//!
//! ## Architecture
//!
//! - `config` - Connection and pool settings, loaded from the environment
//! - `error` - Classified error type
//! - `database` - Driver seam, connection lifecycle and operation executors
//! - `pool` - Bounded pools, scoped connection handles, named registry
//! - `facade` - Caller-facing operations over a named pool

pub mod config;
pub mod database;
pub mod error;
pub mod facade;
pub mod pool;

pub use config::{Config, ConnectionConfig, PoolConfig, ReconnectPolicy};
pub use database::{Command, MongoDriver, PaginationResult};
pub use error::{MongoError, Result};
pub use facade::Mongo;
pub use pool::{MongoPool, PoolRegistry, PoolStats, PooledConnection};
