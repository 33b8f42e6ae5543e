//! Dispute document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for disputes
pub const DISPUTE_COLLECTION: &str = "disputes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    #[default]
    Open,
    Resolved,
    Rejected,
}

/// Dispute raised by one participant of an exchange
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DisputeDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub exchange_id: ObjectId,

    /// User id of the participant who raised it
    pub raised_by: String,

    pub reason: String,

    #[serde(default)]
    pub status: DisputeStatus,
}

impl DisputeDoc {
    pub fn new(exchange_id: ObjectId, raised_by: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            exchange_id,
            raised_by: raised_by.into(),
            reason: reason.into(),
            status: DisputeStatus::Open,
        }
    }
}

impl IntoIndexes for DisputeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "exchange_id": 1 },
            Some(IndexOptions::builder().name("exchange_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for DisputeDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
