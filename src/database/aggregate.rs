//! Server-side commands: counts and aggregation pipelines.

use mongodb::bson::{doc, Bson, Document};

use super::connection::Connection;
use super::driver::{Driver, Session};
use super::identifier::normalize_filter;
use crate::error::{MongoError, Result};

/// A raw command document or an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Raw(Document),
    Pipeline(Vec<Document>),
}

impl From<Document> for Command {
    fn from(command: Document) -> Self {
        Self::Raw(command)
    }
}

impl From<Vec<Document>> for Command {
    fn from(pipeline: Vec<Document>) -> Self {
        Self::Pipeline(pipeline)
    }
}

impl Command {
    /// The command document sent for `collection`.
    fn into_document(self, collection: &str) -> Result<Document> {
        match self {
            Self::Raw(command) if command.is_empty() => {
                Err(MongoError::Validation("empty command".to_string()))
            }
            Self::Raw(command) => Ok(command),
            Self::Pipeline(pipeline) => Ok(doc! {
                "aggregate": collection,
                "pipeline": pipeline,
                "cursor": {},
            }),
        }
    }
}

impl<D: Driver> Connection<D> {
    /// Number of documents in `collection` matching `filter`.
    pub async fn count(&mut self, collection: &str, filter: &Document) -> Result<u64> {
        let filter = normalize_filter(filter)?;
        let result = self.count_normalized(collection, filter).await;
        self.observe(result)
    }

    pub(crate) async fn count_normalized(&self, collection: &str, filter: Document) -> Result<u64> {
        let command = doc! { "count": collection, "query": filter };
        let reply = self
            .session()?
            .run_command(&self.config().database, command)
            .await?;

        match reply.get("n") {
            Some(Bson::Int32(n)) if *n >= 0 => Ok(*n as u64),
            Some(Bson::Int64(n)) if *n >= 0 => Ok(*n as u64),
            Some(Bson::Double(n)) if *n >= 0.0 => Ok(*n as u64),
            other => Err(MongoError::Runtime(format!(
                "count reply has no usable 'n' field: {other:?}"
            ))),
        }
    }

    /// Run a raw command or aggregation pipeline and return the reply.
    pub async fn command(&mut self, collection: &str, command: Command) -> Result<Document> {
        let command = command.into_document(collection)?;
        let result = match self.session() {
            Ok(session) => session.run_command(&self.config().database, command).await,
            Err(err) => Err(err),
        };
        self.observe(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mongodb::bson::oid::ObjectId;

    use super::*;
    use crate::config::{ConnectionConfig, ReconnectPolicy};
    use crate::database::testing::MockDriver;

    async fn connection(driver: &MockDriver) -> Connection<MockDriver> {
        Connection::create(
            1,
            Arc::new(driver.clone()),
            Arc::new(ConnectionConfig::new("localhost", 27017, "shop")),
            ReconnectPolicy::immediate(5),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_count_matches_filter() {
        let driver = MockDriver::new();
        driver.seed(
            "shop.orders",
            [doc! { "paid": true }, doc! { "paid": false }, doc! { "paid": true }],
        );
        let mut conn = connection(&driver).await;

        assert_eq!(conn.count("orders", &doc! { "paid": true }).await.unwrap(), 2);
        assert_eq!(conn.count("orders", &doc! {}).await.unwrap(), 3);
        assert_eq!(
            driver.state().commands[0],
            doc! { "count": "orders", "query": { "paid": true } }
        );
    }

    #[tokio::test]
    async fn test_count_normalizes_id() {
        let driver = MockDriver::new();
        let oid = ObjectId::new();
        driver.seed("shop.orders", [doc! { "_id": oid }]);
        let mut conn = connection(&driver).await;

        let n = conn.count("orders", &doc! { "_id": oid.to_hex() }).await.unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_pipeline_wrapped_as_aggregate() {
        let driver = MockDriver::new();
        driver.seed("shop.orders", [doc! { "total": 5 }]);
        let mut conn = connection(&driver).await;

        let pipeline = vec![doc! { "$match": { "total": { "$gt": 1 } } }];
        let reply = conn.command("orders", pipeline.clone().into()).await.unwrap();

        assert_eq!(
            driver.state().commands[0],
            doc! { "aggregate": "orders", "pipeline": pipeline, "cursor": {} }
        );
        let batch = reply.get_document("cursor").unwrap().get_array("firstBatch").unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_raw_command_passes_through() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;

        let reply = conn.command("orders", doc! { "buildInfo": 1 }.into()).await.unwrap();
        assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
        assert_eq!(driver.state().commands, vec![doc! { "buildInfo": 1 }]);
    }

    #[tokio::test]
    async fn test_empty_command_rejected_without_io() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;

        let err = conn.command("orders", Document::new().into()).await.unwrap_err();
        assert!(matches!(err, MongoError::Validation(_)));
        assert!(driver.state().commands.is_empty());
    }

    #[tokio::test]
    async fn test_count_failure_propagates() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;
        driver.fail_ops([MongoError::Runtime("command failed".into())]);

        assert!(conn.count("orders", &doc! {}).await.is_err());
    }
}
