//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures::stream::{Stream, TryStreamExt};
use std::fmt::Display;
use mongodb::{
    options::{FindOptions, IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::db::schemas::Metadata;
use crate::types::MarketError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, MarketError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| MarketError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MarketError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, creating its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, MarketError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }
}

/// Typed MongoDB collection that hides soft-deleted documents
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, MarketError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), MarketError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| MarketError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, MarketError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| MarketError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| MarketError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, MarketError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| MarketError::Database(format!("Find failed: {}", e)))
    }

    /// Find live documents with sort/skip/limit options
    pub async fn find_with(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<T>, MarketError> {
        let cursor = self
            .inner
            .find(live(filter))
            .with_options(options)
            .await
            .map_err(|e| MarketError::Database(format!("Find failed: {}", e)))?;

        collect_all(cursor).await
    }

    /// Count live documents
    pub async fn count(&self, filter: Document) -> Result<u64, MarketError> {
        self.inner
            .count_documents(live(filter))
            .await
            .map_err(|e| MarketError::Database(format!("Count failed: {}", e)))
    }

    /// Update one live document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, MarketError> {
        self.inner
            .update_one(live(filter), update.into())
            .await
            .map_err(|e| MarketError::Database(format!("Update failed: {}", e)))
    }
}

/// Drain a cursor. One undecodable document fails the whole read, so a page
/// never comes back shorter than the matching count.
async fn collect_all<T, E, S>(cursor: S) -> Result<Vec<T>, MarketError>
where
    E: Display,
    S: Stream<Item = Result<T, E>>,
{
    cursor
        .try_collect()
        .await
        .map_err(|e| MarketError::Database(format!("Error reading document: {}", e)))
}

fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_filter_excludes_deleted() {
        let filter = live(doc! { "status": "open" });
        assert_eq!(filter.get_str("status").unwrap(), "open");
        assert_eq!(
            filter.get_document("metadata.is_deleted").unwrap(),
            &doc! { "$ne": true }
        );
    }

    #[tokio::test]
    async fn test_collect_all_fails_on_bad_document() {
        let ok = futures::stream::iter(vec![Ok::<_, String>(1), Ok(2)]);
        assert_eq!(collect_all(ok).await.unwrap(), vec![1, 2]);

        let bad = futures::stream::iter(vec![Ok(1), Err("missing field `user_id`".to_string()), Ok(3)]);
        match collect_all(bad).await {
            Err(MarketError::Database(msg)) => assert!(msg.contains("user_id")),
            other => panic!("expected database error, got {:?}", other),
        }
    }
}
