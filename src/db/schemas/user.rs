//! User document schema
//!
//! Local account record keyed by the identity-provider subject. Credentials
//! live with the identity provider, not here.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Account role for moderation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    #[default]
    Member,
    Admin,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::Member => write!(f, "member"),
            AccountRole::Admin => write!(f, "admin"),
        }
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Identity-provider subject
    pub user_id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub role: AccountRole,

    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Why an admin suspended the account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_reason: Option<String>,
}

fn default_true() -> bool {
    true
}

impl UserDoc {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id: user_id.into(),
            display_name: display_name.into(),
            role: AccountRole::Member,
            is_active: true,
            suspended_reason: None,
        }
    }

    pub fn with_role(mut self, role: AccountRole) -> Self {
        self.role = role;
        self
    }

    /// Active admin accounts only
    pub fn is_admin(&self) -> bool {
        self.is_active && self.role == AccountRole::Admin
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "is_active": 1 },
                Some(IndexOptions::builder().name("is_active_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspended_admin_is_not_admin() {
        let mut user = UserDoc::new("mod-1", "Moderator").with_role(AccountRole::Admin);
        assert!(user.is_admin());

        user.is_active = false;
        assert!(!user.is_admin());
    }

    #[test]
    fn test_missing_fields_default() {
        let user: UserDoc = bson::from_document(doc! { "user_id": "u9" }).unwrap();
        assert!(user.is_active);
        assert_eq!(user.role, AccountRole::Member);
        assert!(!user.is_admin());
    }
}
