//! Bounded connection pool and the scoped handle it hands out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mongodb::bson::Document;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error};

use super::stats::{Counters, PoolStats};
use crate::config::{ConnectionConfig, PoolConfig};
use crate::database::{Command, Connection, Driver, PaginationResult};
use crate::error::{MongoError, Result};

/// A bounded pool of connections to one database.
///
/// Connections are opened lazily and health-checked on every acquisition.
pub struct MongoPool<D: Driver> {
    name: Arc<str>,
    driver: Arc<D>,
    connection: Arc<ConnectionConfig>,
    config: PoolConfig,
    idle: Mutex<Vec<Connection<D>>>,
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
    counters: Counters,
}

impl<D: Driver> MongoPool<D> {
    /// Create an empty pool. No connection is opened until `acquire`.
    pub fn new(
        name: impl Into<Arc<str>>,
        driver: D,
        connection: ConnectionConfig,
        config: PoolConfig,
    ) -> Arc<Self> {
        let name = name.into();
        debug!(pool = %name, max_size = config.max_size, "Creating mongo pool");

        Arc::new(Self {
            permits: Arc::new(Semaphore::new(config.max_size)),
            name,
            driver: Arc::new(driver),
            connection: Arc::new(connection),
            config,
            idle: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection settings shared by every connection of this pool.
    pub fn config(&self) -> &ConnectionConfig {
        &self.connection
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Connections waiting in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Stop handing out connections. Pending and future `acquire`s fail.
    pub fn close(&self) {
        self.permits.close();
        self.idle.lock().clear();
        debug!(pool = %self.name, "Closed mongo pool");
    }

    /// Take a healthy connection, opening one if none is idle.
    ///
    /// A connection that fails its health check (after any reconnect
    /// attempts) is dropped and the classified error returned.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<D>> {
        let permit = match tokio::time::timeout(
            self.config.acquire_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(MongoError::PoolClosed(self.name.to_string())),
            Err(_) => return Err(MongoError::PoolTimeout(self.name.to_string())),
        };

        let idle = self.idle.lock().pop();
        let mut connection = match idle {
            Some(connection) => connection,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let connection = Connection::create(
                    id,
                    Arc::clone(&self.driver),
                    Arc::clone(&self.connection),
                    self.config.reconnect.clone(),
                )
                .await?;
                self.counters.record_create();
                connection
            }
        };

        if let Err(err) = connection.check().await {
            error!(pool = %self.name, connection = connection.id(), error = %err, "Mongo health check failed");
            self.counters.record_discard();
            return Err(err);
        }

        self.counters.record_acquire();
        Ok(PooledConnection {
            pool: Arc::clone(self),
            connection: Some(connection),
            _permit: permit,
        })
    }

    fn release(&self, connection: Connection<D>) {
        self.counters.record_release();
        if self.permits.is_closed() {
            return;
        }
        debug!(pool = %self.name, connection = connection.id(), "Released mongo connection");
        self.idle.lock().push(connection);
    }
}

impl<D: Driver> std::fmt::Debug for MongoPool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoPool")
            .field("name", &self.name)
            .field("database", &self.connection.database)
            .field("max_size", &self.config.max_size)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A connection borrowed from a [`MongoPool`].
///
/// Each operation consumes the handle, so it cannot be used after the
/// operation finishes. The connection goes back to the pool exactly once,
/// when the handle is dropped, whether the operation succeeded, failed or
/// was cancelled.
pub struct PooledConnection<D: Driver> {
    pool: Arc<MongoPool<D>>,
    connection: Option<Connection<D>>,
    _permit: OwnedSemaphorePermit,
}

impl<D: Driver> PooledConnection<D> {
    fn connection(&mut self) -> Result<&mut Connection<D>> {
        self.connection
            .as_mut()
            .ok_or_else(|| MongoError::Unexpected("connection already released".to_string()))
    }

    /// Return the connection to the pool now.
    pub fn release(self) {}

    pub async fn query_all(
        mut self,
        collection: &str,
        filter: &Document,
        options: &Document,
    ) -> Result<Vec<Document>> {
        self.connection()?.query_all(collection, filter, options).await
    }

    pub async fn query_paginated(
        mut self,
        collection: &str,
        limit: i64,
        current_page: i64,
        filter: &Document,
        options: &Document,
    ) -> Result<PaginationResult> {
        self.connection()?
            .query_paginated(collection, limit, current_page, filter, options)
            .await
    }

    pub async fn insert_one(mut self, collection: &str, document: Document) -> Result<String> {
        self.connection()?.insert_one(collection, document).await
    }

    pub async fn insert_many(
        mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<String>> {
        self.connection()?.insert_many(collection, documents).await
    }

    pub async fn update_row(
        mut self,
        collection: &str,
        filter: &Document,
        replacement: Document,
    ) -> Result<u64> {
        self.connection()?
            .update_row(collection, filter, replacement)
            .await
    }

    pub async fn update_column(
        mut self,
        collection: &str,
        filter: &Document,
        fields: Document,
    ) -> Result<u64> {
        self.connection()?
            .update_column(collection, filter, fields)
            .await
    }

    pub async fn delete(
        mut self,
        collection: &str,
        filter: &Document,
        limit_to_one: bool,
    ) -> Result<u64> {
        self.connection()?
            .delete(collection, filter, limit_to_one)
            .await
    }

    pub async fn count(mut self, collection: &str, filter: &Document) -> Result<u64> {
        self.connection()?.count(collection, filter).await
    }

    pub async fn command(mut self, collection: &str, command: Command) -> Result<Document> {
        self.connection()?.command(collection, command).await
    }
}

impl<D: Driver> std::fmt::Debug for PooledConnection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool.name())
            .field("connection", &self.connection)
            .finish()
    }
}

impl<D: Driver> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}
