//! MongoDB driver backed by the official `mongodb` crate.

use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, CollectionOptions, FindOptions, WriteConcern};
use mongodb::{Client, Collection};
use tracing::debug;

use super::driver::{Driver, Namespace, QueryOptions, Session, Update};
use super::identifier::ID_FIELD;
use crate::error::Result;

/// Production driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

impl Driver for MongoDriver {
    type Session = MongoSession;

    /// Parse the URI and build a client. The client connects lazily.
    async fn connect(&self, uri: &str) -> Result<MongoSession> {
        let options = session_options(ClientOptions::parse(uri).await?);
        let client = Client::with_options(options)?;
        debug!("MongoDB client created");
        Ok(MongoSession { client })
    }
}

/// One pooled connection maps to one server connection.
fn session_options(mut options: ClientOptions) -> ClientOptions {
    options.max_pool_size = Some(1);
    options
}

/// Session wrapper around a MongoDB client.
#[derive(Debug, Clone)]
pub struct MongoSession {
    client: Client,
}

impl MongoSession {
    fn collection(&self, namespace: &Namespace, concern: Option<&WriteConcern>) -> Collection<Document> {
        let options = CollectionOptions::builder()
            .write_concern(concern.cloned())
            .build();
        self.client
            .database(&namespace.database)
            .collection_with_options(&namespace.collection, options)
    }
}

/// Pipeline replacing each matched document with `replacement`, keeping its `_id`.
fn replacement_pipeline(mut replacement: Document) -> Vec<Document> {
    replacement.remove(ID_FIELD);
    vec![doc! {
        "$replaceWith": {
            "$mergeObjects": [ { "_id": "$_id" }, { "$literal": replacement } ]
        }
    }]
}

impl Session for MongoSession {
    async fn ping(&self, database: &str) -> Result<()> {
        self.client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn find(
        &self,
        namespace: &Namespace,
        filter: Document,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        let find_options = FindOptions::builder()
            .limit(options.positive_limit())
            .skip(options.positive_skip())
            .sort(options.sort.clone())
            .projection(options.projection.clone())
            .build();

        let cursor = self
            .collection(namespace, None)
            .find(filter)
            .with_options(find_options)
            .await?;
        let rows: Vec<Document> = cursor.try_collect().await?;
        Ok(rows)
    }

    async fn insert(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        concern: &WriteConcern,
    ) -> Result<()> {
        self.collection(namespace, Some(concern))
            .insert_many(documents)
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Update,
        concern: &WriteConcern,
    ) -> Result<u64> {
        let collection = self.collection(namespace, Some(concern));
        let result = match update {
            Update::ReplaceAll(replacement) => {
                collection
                    .update_many(filter, replacement_pipeline(replacement))
                    .await?
            }
            Update::SetFirst(fields) => {
                collection.update_one(filter, doc! { "$set": fields }).await?
            }
        };
        Ok(result.matched_count)
    }

    async fn delete(
        &self,
        namespace: &Namespace,
        filter: Document,
        limit_one: bool,
        concern: &WriteConcern,
    ) -> Result<u64> {
        let collection = self.collection(namespace, Some(concern));
        let result = if limit_one {
            collection.delete_one(filter).await?
        } else {
            collection.delete_many(filter).await?
        };
        Ok(result.deleted_count)
    }

    async fn run_command(&self, database: &str, command: Document) -> Result<Document> {
        Ok(self.client.database(database).run_command(command).await?)
    }
}
