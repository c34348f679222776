//! Pool module - bounded connection pools and their registry.
//!
//! ## Architecture
//!
//! - `MongoPool` - bounded pool, opens connections lazily and health-checks
//!   them on every acquisition
//! - `PooledConnection` - scoped handle; every operation consumes it and the
//!   connection returns to the pool exactly once on drop
//! - `PoolRegistry` - named pools, built at startup and passed by reference
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pool = MongoPool::new("mongo", MongoDriver, connection, PoolConfig::default());
//! let rows = pool.acquire().await?.query_all("users", &doc! {}, &doc! {}).await?;
//! ```

mod pooled;
mod registry;
mod stats;

pub use pooled::{MongoPool, PooledConnection};
pub use registry::PoolRegistry;
pub use stats::PoolStats;
