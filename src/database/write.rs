//! Writes: inserts, updates and deletes.
//!
//! Every write is acknowledged by a majority of replica set members, waiting
//! at most [`WRITE_CONCERN_TIMEOUT`](super::driver::WRITE_CONCERN_TIMEOUT).
//! A write concern timeout is a failure like any other and is not retried.

use mongodb::bson::{Bson, Document};

use super::connection::Connection;
use super::driver::{majority_concern, Driver, Session, Update};
use super::identifier::{ensure_id, id_to_string, normalize_filter};
use crate::error::{MongoError, Result};

/// Check that loosely typed input is a non-empty sequence of documents.
///
/// Runs before any connection is acquired, so a flat input never leads to a
/// partial write.
pub fn validate_documents(documents: Vec<Bson>) -> Result<Vec<Document>> {
    if documents.is_empty() {
        return Err(MongoError::Validation(
            "insert_many needs at least one document".to_string(),
        ));
    }

    documents
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Bson::Document(document) => Ok(document),
            other => Err(MongoError::Validation(format!(
                "insert_many expects a sequence of documents, element {i} is {:?}",
                other.element_type()
            ))),
        })
        .collect()
}

impl<D: Driver> Connection<D> {
    /// Insert one document and return its `_id` as a string.
    pub async fn insert_one(&mut self, collection: &str, document: Document) -> Result<String> {
        let mut ids = self.insert_many(collection, vec![document]).await?;
        ids.pop()
            .ok_or_else(|| MongoError::Unexpected("insert returned no id".to_string()))
    }

    /// Insert documents in one batch and return their `_id`s as strings.
    pub async fn insert_many(
        &mut self,
        collection: &str,
        mut documents: Vec<Document>,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = documents
            .iter_mut()
            .map(|document| id_to_string(&ensure_id(document)))
            .collect();

        let namespace = self.namespace(collection);
        let result = match self.session() {
            Ok(session) => {
                session
                    .insert(&namespace, documents, &majority_concern())
                    .await
            }
            Err(err) => Err(err),
        };
        self.observe(result).map(|()| ids)
    }

    /// Replace every matching document with `replacement`.
    ///
    /// Fields missing from `replacement` are dropped. Returns the matched
    /// count.
    pub async fn update_row(
        &mut self,
        collection: &str,
        filter: &Document,
        replacement: Document,
    ) -> Result<u64> {
        self.update(collection, filter, Update::ReplaceAll(replacement))
            .await
    }

    /// Set the fields of `fields` on the first matching document only.
    pub async fn update_column(
        &mut self,
        collection: &str,
        filter: &Document,
        fields: Document,
    ) -> Result<u64> {
        self.update(collection, filter, Update::SetFirst(fields))
            .await
    }

    async fn update(
        &mut self,
        collection: &str,
        filter: &Document,
        update: Update,
    ) -> Result<u64> {
        let filter = normalize_filter(filter)?;
        let namespace = self.namespace(collection);
        let result = match self.session() {
            Ok(session) => {
                session
                    .update(&namespace, filter, update, &majority_concern())
                    .await
            }
            Err(err) => Err(err),
        };
        self.observe(result)
    }

    /// Delete the first match (`limit_to_one`) or every match.
    ///
    /// Returns the deleted count.
    pub async fn delete(
        &mut self,
        collection: &str,
        filter: &Document,
        limit_to_one: bool,
    ) -> Result<u64> {
        let filter = normalize_filter(filter)?;
        let namespace = self.namespace(collection);
        let result = match self.session() {
            Ok(session) => {
                session
                    .delete(&namespace, filter, limit_to_one, &majority_concern())
                    .await
            }
            Err(err) => Err(err),
        };
        self.observe(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mongodb::bson::{doc, oid::ObjectId};
    use mongodb::options::Acknowledgment;

    use super::*;
    use crate::config::{ConnectionConfig, ReconnectPolicy};
    use crate::database::testing::MockDriver;

    const NS: &str = "shop.users";

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

    fn users() -> Vec<Document> {
        vec![
            doc! { "_id": 1, "name": "a", "role": "admin", "age": 30 },
            doc! { "_id": 2, "name": "b", "role": "admin", "age": 40 },
            doc! { "_id": 3, "name": "c", "role": "user", "age": 50 },
        ]
    }

    #[test]
    fn test_validate_rejects_flat_input() {
        let err = validate_documents(vec![Bson::from("a"), Bson::from(1)]).unwrap_err();
        assert!(matches!(err, MongoError::Validation(_)));

        let err = validate_documents(vec![Bson::Document(doc! { "a": 1 }), Bson::from(2)]).unwrap_err();
        assert!(err.to_string().contains("element 1"));

        assert!(validate_documents(vec![]).is_err());
    }

    #[test]
    fn test_validate_accepts_documents() {
        let docs = validate_documents(vec![
            Bson::Document(doc! { "a": 1 }),
            Bson::Document(doc! { "a": 2 }),
        ])
        .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_one_returns_generated_id() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;

        let id = conn.insert_one("users", doc! { "name": "x" }).await.unwrap();
        assert!(ObjectId::parse_str(&id).is_ok());

        let rows = driver.rows(NS);
        assert_eq!(rows[0].get_object_id("_id").unwrap().to_hex(), id);
    }

    #[tokio::test]
    async fn test_insert_one_keeps_custom_id() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;

        let id = conn
            .insert_one("users", doc! { "_id": "custom ID", "name": "x" })
            .await
            .unwrap();
        assert_eq!(id, "custom ID");
    }

    #[tokio::test]
    async fn test_writes_use_majority_concern() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;

        conn.insert_one("users", doc! { "name": "x" }).await.unwrap();
        conn.delete("users", &doc! {}, false).await.unwrap();

        let state = driver.state();
        assert_eq!(state.concerns.len(), 2);
        for concern in &state.concerns {
            assert_eq!(concern.w, Some(Acknowledgment::Majority));
            assert_eq!(concern.w_timeout, Some(Duration::from_millis(1000)));
        }
    }

    #[tokio::test]
    async fn test_insert_many_returns_all_ids() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;

        let ids = conn
            .insert_many("users", vec![doc! { "_id": "a" }, doc! { "name": "b" }])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], "a");
        assert_eq!(driver.rows(NS).len(), 2);
    }

    #[tokio::test]
    async fn test_update_row_replaces_all_matches() {
        let driver = MockDriver::new();
        driver.seed(NS, users());
        let mut conn = connection(&driver).await;

        let matched = conn
            .update_row("users", &doc! { "role": "admin" }, doc! { "name": "x" })
            .await
            .unwrap();

        assert_eq!(matched, 2);
        let rows = driver.rows(NS);
        assert_eq!(rows[0], doc! { "_id": 1, "name": "x" });
        assert_eq!(rows[1], doc! { "_id": 2, "name": "x" });
        assert_eq!(rows[2], users()[2]);
    }

    #[tokio::test]
    async fn test_update_column_sets_field_on_first_match() {
        let driver = MockDriver::new();
        driver.seed(NS, users());
        let mut conn = connection(&driver).await;

        let matched = conn
            .update_column("users", &doc! { "role": "admin" }, doc! { "name": "x" })
            .await
            .unwrap();

        assert_eq!(matched, 1);
        let rows = driver.rows(NS);
        assert_eq!(rows[0], doc! { "_id": 1, "name": "x", "role": "admin", "age": 30 });
        assert_eq!(rows[1], users()[1]);
    }

    #[tokio::test]
    async fn test_update_normalizes_id() {
        let driver = MockDriver::new();
        let oid = ObjectId::new();
        driver.seed(NS, [doc! { "_id": oid, "name": "a" }]);
        let mut conn = connection(&driver).await;

        let matched = conn
            .update_column("users", &doc! { "_id": oid.to_hex() }, doc! { "name": "b" })
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(driver.state().filters, vec![doc! { "_id": oid }]);
    }

    #[tokio::test]
    async fn test_delete_limit_to_one() {
        let driver = MockDriver::new();
        driver.seed(NS, users());
        let mut conn = connection(&driver).await;

        let deleted = conn.delete("users", &doc! { "role": "admin" }, true).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(driver.rows(NS).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_all_matches() {
        let driver = MockDriver::new();
        driver.seed(NS, users());
        let mut conn = connection(&driver).await;

        let deleted = conn.delete("users", &doc! { "role": "admin" }, false).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(driver.rows(NS), vec![users()[2].clone()]);
    }

    #[tokio::test]
    async fn test_write_concern_timeout_is_not_retried() {
        let driver = MockDriver::new();
        let mut conn = connection(&driver).await;
        driver.fail_ops([MongoError::Runtime("waiting for replication timed out".into())]);

        let err = conn
            .update_row("users", &doc! {}, doc! { "name": "x" })
            .await
            .unwrap_err();
        assert!(matches!(err, MongoError::Runtime(_)));
        assert_eq!(driver.state().concerns.len(), 1);
        assert!(conn.is_usable());
    }
}
