//! Pool registry - named access point to connection pools.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::MongoPool;
use crate::database::Driver;
use crate::error::{MongoError, Result};

/// Registry of connection pools keyed by name.
///
/// Built once at startup and passed by reference to whatever needs a
/// pool, so there is one shared access point per logical database
/// without a process-wide static.
///
/// ## Example
///
/// ```rust,ignore
/// let registry = PoolRegistry::new();
/// registry.register(MongoPool::new("mongo", MongoDriver, connection, PoolConfig::default()))?;
///
/// // Later, resolve the same pool
/// let pool = registry.get::<MongoDriver>("mongo")?;
/// ```
#[derive(Clone)]
pub struct PoolRegistry {
    pools: Arc<RwLock<HashMap<String, PoolEntry>>>,
}

/// Internal entry storing a type-erased pool.
struct PoolEntry {
    pool: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl PoolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        info!("Pool registry initialized");
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a pool under its name.
    ///
    /// Fails with [`MongoError::Argument`] if the name is already taken.
    pub fn register<D: Driver>(&self, pool: Arc<MongoPool<D>>) -> Result<()> {
        let mut pools = self.pools.write();
        let name = pool.name().to_string();

        if let Some(existing) = pools.get(&name) {
            return Err(MongoError::Argument(format!(
                "pool '{}' already registered ({})",
                name, existing.type_name
            )));
        }

        debug!("Registering pool: {}", name);

        pools.insert(
            name,
            PoolEntry {
                pool,
                type_id: TypeId::of::<MongoPool<D>>(),
                type_name: std::any::type_name::<MongoPool<D>>(),
            },
        );
        Ok(())
    }

    /// Get a pool by name.
    ///
    /// Fails with [`MongoError::Argument`] if no pool has that name or it
    /// was registered with a different driver type.
    pub fn get<D: Driver>(&self, name: &str) -> Result<Arc<MongoPool<D>>> {
        let pools = self.pools.read();
        let entry = pools
            .get(name)
            .ok_or_else(|| MongoError::Argument(format!("no pool registered as '{name}'")))?;

        if entry.type_id != TypeId::of::<MongoPool<D>>() {
            return Err(MongoError::Argument(format!(
                "pool '{}' type mismatch: expected {}, got {}",
                name,
                std::any::type_name::<MongoPool<D>>(),
                entry.type_name
            )));
        }

        Arc::clone(&entry.pool)
            .downcast::<MongoPool<D>>()
            .map_err(|_| MongoError::Unexpected(format!("pool '{name}' failed to downcast")))
    }

    /// Check if a pool with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.pools.read().contains_key(name)
    }

    /// Remove a pool from the registry.
    ///
    /// Returns `true` if the pool was removed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.pools.write().remove(name).is_some();
        if removed {
            debug!("Removed pool: {}", name);
        }
        removed
    }

    /// Get the number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    /// Get a list of all registered pool names.
    pub fn names(&self) -> Vec<String> {
        self.pools.read().keys().cloned().collect()
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pools = self.pools.read();
        f.debug_struct("PoolRegistry")
            .field("pool_count", &pools.len())
            .field("pool_names", &pools.keys().collect::<Vec<_>>())
            .finish()
    }
}
