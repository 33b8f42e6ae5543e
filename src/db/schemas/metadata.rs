//! Bookkeeping fields shared by every document

use bson::DateTime;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Soft-deleted documents are invisible to every query
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(now),
            created_at: Some(now),
        }
    }

    /// Bump `updated_at` to now
    pub fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}
