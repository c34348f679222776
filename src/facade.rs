//! Caller-facing facade over a named pool.
//!
//! Each call acquires a connection, runs one operation and lets the handle
//! go back to the pool. Failures are reported to the log before being
//! returned, so a caller that only wants the old fail-soft behavior can use
//! `unwrap_or_default()`.

use std::sync::Arc;

use mongodb::bson::{Bson, Document};
use tracing::error;

use crate::database::{validate_documents, Command, Driver, MongoDriver, PaginationResult};
use crate::error::Result;
use crate::pool::{MongoPool, PoolRegistry};

/// Operation facade for one pool.
pub struct Mongo<D: Driver = MongoDriver> {
    pool: Arc<MongoPool<D>>,
}

impl<D: Driver> Clone for Mongo<D> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

/// Log a failed operation. The error is passed through unchanged.
fn report<T>(operation: &'static str, collection: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        error!(operation, collection, error = %err, "Mongo operation failed");
    }
    result
}

impl<D: Driver> Mongo<D> {
    pub fn new(pool: Arc<MongoPool<D>>) -> Self {
        Self { pool }
    }

    /// Resolve the pool registered under `name`.
    pub fn from_registry(registry: &PoolRegistry, name: &str) -> Result<Self> {
        registry.get::<D>(name).map(Self::new)
    }

    pub fn pool(&self) -> &Arc<MongoPool<D>> {
        &self.pool
    }

    /// Every document matching `filter`.
    pub async fn query_all(
        &self,
        collection: &str,
        filter: &Document,
        options: &Document,
    ) -> Result<Vec<Document>> {
        let result = async {
            self.pool
                .acquire()
                .await?
                .query_all(collection, filter, options)
                .await
        }
        .await;
        report("query_all", collection, result)
    }

    /// One page of documents matching `filter` plus the total count.
    pub async fn query_paginated(
        &self,
        collection: &str,
        limit: i64,
        current_page: i64,
        filter: &Document,
        options: &Document,
    ) -> Result<PaginationResult> {
        let result = async {
            self.pool
                .acquire()
                .await?
                .query_paginated(collection, limit, current_page, filter, options)
                .await
        }
        .await;
        report("query_paginated", collection, result)
    }

    /// Insert one document, returning its `_id` as a string.
    pub async fn insert_one(&self, collection: &str, document: Document) -> Result<String> {
        let result = async {
            self.pool
                .acquire()
                .await?
                .insert_one(collection, document)
                .await
        }
        .await;
        report("insert_one", collection, result)
    }

    /// Insert a batch of documents, returning their `_id`s as strings.
    ///
    /// Input that is not a non-empty sequence of documents fails with
    /// [`MongoError::Validation`](crate::MongoError::Validation) before any
    /// connection is acquired.
    pub async fn insert_many(&self, collection: &str, documents: Vec<Bson>) -> Result<Vec<String>> {
        let documents = validate_documents(documents)?;
        let result = async {
            self.pool
                .acquire()
                .await?
                .insert_many(collection, documents)
                .await
        }
        .await;
        report("insert_many", collection, result)
    }

    /// Replace every document matching `filter` with `replacement`.
    pub async fn update_row(
        &self,
        collection: &str,
        filter: &Document,
        replacement: Document,
    ) -> Result<u64> {
        let result = async {
            self.pool
                .acquire()
                .await?
                .update_row(collection, filter, replacement)
                .await
        }
        .await;
        report("update_row", collection, result)
    }

    /// Set the given fields on the first document matching `filter`.
    pub async fn update_column(
        &self,
        collection: &str,
        filter: &Document,
        fields: Document,
    ) -> Result<u64> {
        let result = async {
            self.pool
                .acquire()
                .await?
                .update_column(collection, filter, fields)
                .await
        }
        .await;
        report("update_column", collection, result)
    }

    /// Delete the first match when `limit_to_one`, otherwise every match.
    pub async fn delete(
        &self,
        collection: &str,
        filter: &Document,
        limit_to_one: bool,
    ) -> Result<u64> {
        let result = async {
            self.pool
                .acquire()
                .await?
                .delete(collection, filter, limit_to_one)
                .await
        }
        .await;
        report("delete", collection, result)
    }

    /// Count documents matching `filter`.
    pub async fn count(&self, collection: &str, filter: &Document) -> Result<u64> {
        let result = async { self.pool.acquire().await?.count(collection, filter).await }.await;
        report("count", collection, result)
    }

    /// Run a raw command or an aggregation pipeline against the database.
    pub async fn command(&self, collection: &str, command: impl Into<Command>) -> Result<Document> {
        let command = command.into();
        let result = async { self.pool.acquire().await?.command(collection, command).await }.await;
        report("command", collection, result)
    }
}
