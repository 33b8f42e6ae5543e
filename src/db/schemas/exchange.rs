//! Exchange document schema
//!
//! One negotiated exchange between two members, including the terms both
//! sides are editing.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::exchange::{
    ExchangeRole, ExchangeStatus, ExchangeType, ExchangeView, Offer, Participant, Terms,
};

/// Collection name for exchanges
pub const EXCHANGE_COLLECTION: &str = "exchanges";

/// Exchange document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExchangeDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub exchange_type: ExchangeType,

    #[serde(default)]
    pub status: ExchangeStatus,

    /// Member who proposed the exchange
    pub initiator: Participant,

    /// Member the proposal was sent to
    pub recipient: Participant,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_offer: Option<Offer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_offer: Option<Offer>,

    #[serde(default)]
    pub terms: Terms,
}

impl ExchangeDoc {
    pub fn new(
        exchange_type: ExchangeType,
        initiator: Participant,
        recipient: Participant,
        initiator_offer: Option<Offer>,
        recipient_offer: Option<Offer>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            exchange_type,
            status: ExchangeStatus::Proposed,
            initiator,
            recipient,
            initiator_offer,
            recipient_offer,
            terms: Terms::default(),
        }
    }

    /// Hex form of the document id, empty if not yet stored
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

impl ExchangeView for ExchangeDoc {
    fn exchange_type(&self) -> ExchangeType {
        self.exchange_type
    }

    fn initiator(&self) -> &Participant {
        &self.initiator
    }

    fn recipient(&self) -> &Participant {
        &self.recipient
    }

    fn offer_of(&self, role: ExchangeRole) -> Option<&Offer> {
        match role {
            ExchangeRole::Initiator => self.initiator_offer.as_ref(),
            ExchangeRole::Recipient => self.recipient_offer.as_ref(),
        }
    }
}

impl IntoIndexes for ExchangeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "initiator.userId": 1 },
                Some(
                    IndexOptions::builder()
                        .name("initiator_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "recipient.userId": 1 },
                Some(
                    IndexOptions::builder()
                        .name("recipient_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for ExchangeDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{resolve, BusinessRole};

    #[test]
    fn test_document_resolves_like_exchange() {
        let doc = ExchangeDoc::new(
            ExchangeType::SkillForMoney,
            Participant::new("alice"),
            Participant::new("bob"),
            Some(Offer::money(75.0, "USD")),
            Some(Offer::skill("photography")),
        );

        assert_eq!(resolve(&doc, "alice").business_role, BusinessRole::MoneyProvider);
        assert_eq!(resolve(&doc, "bob").business_role, BusinessRole::SkillProvider);
    }

    #[test]
    fn test_bson_round_trip_keeps_participants() {
        let doc = ExchangeDoc::new(
            ExchangeType::SkillForSkill,
            Participant::new("alice"),
            Participant::new("bob"),
            None,
            None,
        );

        let raw = bson::to_document(&doc).unwrap();
        assert_eq!(
            raw.get_document("initiator").unwrap().get_str("userId").unwrap(),
            "alice"
        );
        assert_eq!(raw.get_str("status").unwrap(), "proposed");

        let back: ExchangeDoc = bson::from_document(raw).unwrap();
        assert_eq!(back.recipient.user_id, "bob");
        assert!(back._id.is_none());
    }

    #[test]
    fn test_index_keys_exist_in_stored_shape() {
        let doc = ExchangeDoc::new(
            ExchangeType::SkillForSkill,
            Participant::new("alice"),
            Participant::new("bob"),
            None,
            None,
        );
        let raw = bson::to_document(&doc).unwrap();

        for (keys, _) in ExchangeDoc::into_indices() {
            for path in keys.keys() {
                let mut parts = path.split('.');
                let top = parts.next().unwrap();
                let value = raw.get(top).unwrap_or_else(|| panic!("no field {top}"));
                if let Some(nested) = parts.next() {
                    let sub = value.as_document().unwrap();
                    assert!(sub.contains_key(nested), "index path {path} not stored");
                }
            }
        }
    }
}
