//! Wire boundary between the pool and the underlying database driver.
//!
//! [`Driver`] opens sessions from a connection URI and [`Session`] performs
//! the raw round trips. Everything above this module (health checks,
//! reconnection, identifier handling, release) is driver-agnostic.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use mongodb::bson::Document;
use mongodb::options::{Acknowledgment, WriteConcern};
use serde::Deserialize;

use crate::error::Result;

/// Maximum time a write waits for majority acknowledgment.
pub const WRITE_CONCERN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Write concern applied to every write: majority, capped at one second.
pub fn majority_concern() -> WriteConcern {
    WriteConcern::builder()
        .w(Acknowledgment::Majority)
        .w_timeout(WRITE_CONCERN_TIMEOUT)
        .build()
}

/// Opens sessions to a deployment.
pub trait Driver: Send + Sync + 'static {
    type Session: Session;

    /// Open a session for `uri`. No round trip is required here.
    fn connect(&self, uri: &str) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// An open session to a deployment.
pub trait Session: Send + Sync + 'static {
    /// Minimal administrative round trip against `database`.
    fn ping(&self, database: &str) -> impl Future<Output = Result<()>> + Send;

    /// Run a query and return every row.
    fn find(
        &self,
        namespace: &Namespace,
        filter: Document,
        options: &QueryOptions,
    ) -> impl Future<Output = Result<Vec<Document>>> + Send;

    /// Insert documents. Each already carries its `_id`.
    fn insert(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        concern: &WriteConcern,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Apply an update, returning the number of matched documents.
    fn update(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Update,
        concern: &WriteConcern,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Delete the first match or every match, returning the deleted count.
    fn delete(
        &self,
        namespace: &Namespace,
        filter: Document,
        limit_one: bool,
        concern: &WriteConcern,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Run a raw database command and return the reply.
    fn run_command(
        &self,
        database: &str,
        command: Document,
    ) -> impl Future<Output = Result<Document>> + Send;
}

/// A `(database, collection)` pair, rendered as `database.collection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// How an update changes matched documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replace every matched document whole, keeping each `_id`.
    ReplaceAll(Document),
    /// Set the named fields on the first match only.
    SetFirst(Document),
}

/// Read options accepted by queries. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryOptions {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
}

impl QueryOptions {
    /// Parse loosely typed options.
    pub fn from_document(options: &Document) -> Result<Self> {
        Ok(mongodb::bson::from_document(options.clone())?)
    }

    /// Limit, if positive.
    pub fn positive_limit(&self) -> Option<i64> {
        self.limit.filter(|l| *l > 0)
    }

    /// Skip offset, if positive.
    pub fn positive_skip(&self) -> Option<u64> {
        self.skip.filter(|s| *s > 0).map(|s| s as u64)
    }
}
