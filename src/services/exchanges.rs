//! Exchange persistence
//!
//! `ExchangeStore` is the seam between route handlers and the document store.
//! Status changes are compare-and-set so two participants racing (one editing
//! terms, the other accepting) cannot both win.

use bson::{doc, oid::ObjectId, DateTime};
use dashmap::DashMap;
use tracing::debug;

use crate::db::schemas::{DisputeDoc, ExchangeDoc, DISPUTE_COLLECTION, EXCHANGE_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::exchange::{ExchangeStatus, Terms};
use crate::types::{MarketError, Result};

#[async_trait::async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Short name of the backing store, reported by health checks
    fn backend(&self) -> &'static str;

    async fn insert_exchange(&self, exchange: ExchangeDoc) -> Result<ObjectId>;

    async fn get_exchange(&self, id: &ObjectId) -> Result<Option<ExchangeDoc>>;

    /// Replace the terms if the exchange is still `expected` and move it to
    /// `Negotiating`. Returns false if the status changed underneath.
    async fn update_terms(
        &self,
        id: &ObjectId,
        expected: ExchangeStatus,
        terms: &Terms,
    ) -> Result<bool>;

    /// Move from `from` to `to`. Returns false if the status was not `from`.
    async fn transition(
        &self,
        id: &ObjectId,
        from: ExchangeStatus,
        to: ExchangeStatus,
    ) -> Result<bool>;

    async fn insert_dispute(&self, dispute: DisputeDoc) -> Result<ObjectId>;

    /// Soft-delete a dispute whose status change did not go through
    async fn discard_dispute(&self, id: &ObjectId) -> Result<()>;

    async fn disputes_for(&self, exchange_id: &ObjectId) -> Result<Vec<DisputeDoc>>;
}

/// Parse a path segment into a document id
pub fn parse_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| MarketError::BadRequest(format!("Invalid ID: {}", id)))
}

// =============================================================================
// MongoDB Implementation
// =============================================================================

pub struct MongoExchangeStore {
    exchanges: MongoCollection<ExchangeDoc>,
    disputes: MongoCollection<DisputeDoc>,
}

impl MongoExchangeStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            exchanges: mongo.collection(EXCHANGE_COLLECTION).await?,
            disputes: mongo.collection(DISPUTE_COLLECTION).await?,
        })
    }
}

fn to_bson<T: serde::Serialize>(value: &T) -> Result<bson::Bson> {
    bson::to_bson(value).map_err(|e| MarketError::Internal(format!("BSON encoding failed: {}", e)))
}

#[async_trait::async_trait]
impl ExchangeStore for MongoExchangeStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn insert_exchange(&self, exchange: ExchangeDoc) -> Result<ObjectId> {
        self.exchanges.insert_one(exchange).await
    }

    async fn get_exchange(&self, id: &ObjectId) -> Result<Option<ExchangeDoc>> {
        self.exchanges.find_one(doc! { "_id": *id }).await
    }

    async fn update_terms(
        &self,
        id: &ObjectId,
        expected: ExchangeStatus,
        terms: &Terms,
    ) -> Result<bool> {
        let result = self
            .exchanges
            .update_one(
                doc! { "_id": *id, "status": to_bson(&expected)? },
                doc! {
                    "$set": {
                        "terms": to_bson(terms)?,
                        "status": to_bson(&ExchangeStatus::Negotiating)?,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn transition(
        &self,
        id: &ObjectId,
        from: ExchangeStatus,
        to: ExchangeStatus,
    ) -> Result<bool> {
        let result = self
            .exchanges
            .update_one(
                doc! { "_id": *id, "status": to_bson(&from)? },
                doc! {
                    "$set": {
                        "status": to_bson(&to)?,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn insert_dispute(&self, dispute: DisputeDoc) -> Result<ObjectId> {
        self.disputes.insert_one(dispute).await
    }

    async fn discard_dispute(&self, id: &ObjectId) -> Result<()> {
        self.disputes
            .update_one(
                doc! { "_id": *id },
                doc! {
                    "$set": {
                        "metadata.is_deleted": true,
                        "metadata.deleted_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn disputes_for(&self, exchange_id: &ObjectId) -> Result<Vec<DisputeDoc>> {
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "metadata.created_at": 1 })
            .build();
        self.disputes
            .find_with(doc! { "exchange_id": *exchange_id }, options)
            .await
    }
}

// =============================================================================
// In-memory Implementation (dev mode and tests)
// =============================================================================

#[derive(Default)]
pub struct MemoryExchangeStore {
    exchanges: DashMap<ObjectId, ExchangeDoc>,
    disputes: DashMap<ObjectId, DisputeDoc>,
}

impl MemoryExchangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ExchangeStore for MemoryExchangeStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_exchange(&self, mut exchange: ExchangeDoc) -> Result<ObjectId> {
        let id = ObjectId::new();
        exchange._id = Some(id);
        exchange.metadata.touch();
        self.exchanges.insert(id, exchange);
        debug!(exchange_id = %id, "Stored exchange in memory");
        Ok(id)
    }

    async fn get_exchange(&self, id: &ObjectId) -> Result<Option<ExchangeDoc>> {
        Ok(self
            .exchanges
            .get(id)
            .filter(|e| !e.metadata.is_deleted)
            .map(|e| e.value().clone()))
    }

    async fn update_terms(
        &self,
        id: &ObjectId,
        expected: ExchangeStatus,
        terms: &Terms,
    ) -> Result<bool> {
        match self.exchanges.get_mut(id) {
            Some(mut entry) if entry.status == expected && !entry.metadata.is_deleted => {
                entry.terms = terms.clone();
                entry.status = ExchangeStatus::Negotiating;
                entry.metadata.touch();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition(
        &self,
        id: &ObjectId,
        from: ExchangeStatus,
        to: ExchangeStatus,
    ) -> Result<bool> {
        match self.exchanges.get_mut(id) {
            Some(mut entry) if entry.status == from && !entry.metadata.is_deleted => {
                entry.status = to;
                entry.metadata.touch();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_dispute(&self, mut dispute: DisputeDoc) -> Result<ObjectId> {
        let id = ObjectId::new();
        dispute._id = Some(id);
        self.disputes.insert(id, dispute);
        Ok(id)
    }

    async fn discard_dispute(&self, id: &ObjectId) -> Result<()> {
        if let Some(mut dispute) = self.disputes.get_mut(id) {
            dispute.metadata.is_deleted = true;
            dispute.metadata.deleted_at = Some(DateTime::now());
        }
        Ok(())
    }

    async fn disputes_for(&self, exchange_id: &ObjectId) -> Result<Vec<DisputeDoc>> {
        let mut disputes: Vec<DisputeDoc> = self
            .disputes
            .iter()
            .filter(|d| d.exchange_id == *exchange_id && !d.metadata.is_deleted)
            .map(|d| d.value().clone())
            .collect();
        disputes.sort_by_key(|d| d.metadata.created_at);
        Ok(disputes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeType, Participant};

    fn sample() -> ExchangeDoc {
        ExchangeDoc::new(
            ExchangeType::SkillForSkill,
            Participant::new("a"),
            Participant::new("b"),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn test_update_terms_moves_to_negotiating() {
        let store = MemoryExchangeStore::new();
        let id = store.insert_exchange(sample()).await.unwrap();

        let terms = Terms {
            hours: Some(2.0),
            ..Terms::default()
        };
        assert!(store
            .update_terms(&id, ExchangeStatus::Proposed, &terms)
            .await
            .unwrap());

        let stored = store.get_exchange(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExchangeStatus::Negotiating);
        assert_eq!(stored.terms.hours, Some(2.0));
    }

    #[tokio::test]
    async fn test_update_terms_stale_status() {
        let store = MemoryExchangeStore::new();
        let id = store.insert_exchange(sample()).await.unwrap();
        store
            .transition(&id, ExchangeStatus::Proposed, ExchangeStatus::Accepted)
            .await
            .unwrap();

        assert!(!store
            .update_terms(&id, ExchangeStatus::Proposed, &Terms::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_transition_compare_and_set() {
        let store = MemoryExchangeStore::new();
        let id = store.insert_exchange(sample()).await.unwrap();

        assert!(!store
            .transition(&id, ExchangeStatus::Accepted, ExchangeStatus::Disputed)
            .await
            .unwrap());
        assert!(store
            .transition(&id, ExchangeStatus::Proposed, ExchangeStatus::Cancelled)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_disputes_for_exchange() {
        let store = MemoryExchangeStore::new();
        let id = store.insert_exchange(sample()).await.unwrap();
        let other = store.insert_exchange(sample()).await.unwrap();

        store
            .insert_dispute(DisputeDoc::new(id, "a", "no show"))
            .await
            .unwrap();
        store
            .insert_dispute(DisputeDoc::new(other, "b", "late"))
            .await
            .unwrap();

        let disputes = store.disputes_for(&id).await.unwrap();
        assert_eq!(disputes.len(), 1);
        assert_eq!(disputes[0].reason, "no show");
    }

    #[tokio::test]
    async fn test_discarded_dispute_is_hidden() {
        let store = MemoryExchangeStore::new();
        let id = store.insert_exchange(sample()).await.unwrap();
        let dispute_id = store
            .insert_dispute(DisputeDoc::new(id, "a", "no show"))
            .await
            .unwrap();

        store.discard_dispute(&dispute_id).await.unwrap();
        assert!(store.disputes_for(&id).await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id("not-an-id").is_err());
        let id = ObjectId::new();
        assert_eq!(parse_id(&id.to_hex()).unwrap(), id);
    }
}
