//! Account lookup and moderation

use bson::{doc, oid::ObjectId, DateTime};
use dashmap::DashMap;
use mongodb::options::FindOptions;

use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Page request for listing users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListQuery {
    pub page: u32,
    pub limit: u32,
    pub is_active: Option<bool>,
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            is_active: None,
        }
    }
}

impl UserListQuery {
    pub const MAX_LIMIT: u32 = 100;

    /// Parse `page`, `limit`, and `isActive` from a query string.
    /// Bad values fall back to defaults; limit is clamped to 1..=100.
    pub fn from_query_string(query: Option<&str>) -> Self {
        let mut params = Self::default();

        if let Some(q) = query {
            for pair in q.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    let value = urlencoding::decode(value).unwrap_or_default();
                    match key {
                        "page" => params.page = value.parse().unwrap_or(1),
                        "limit" => params.limit = value.parse().unwrap_or(20),
                        "isActive" | "is_active" => params.is_active = value.parse().ok(),
                        _ => {}
                    }
                }
            }
        }

        params.page = params.page.max(1);
        params.limit = params.limit.clamp(1, Self::MAX_LIMIT);
        params
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId>;

    /// Look up by identity-provider subject
    async fn get_user(&self, user_id: &str) -> Result<Option<UserDoc>>;

    /// One page of users plus the total matching count
    async fn list_users(&self, query: &UserListQuery) -> Result<(Vec<UserDoc>, u64)>;

    /// Activate or suspend. Returns false if the user does not exist.
    async fn set_active(&self, user_id: &str, is_active: bool, reason: Option<String>)
        -> Result<bool>;
}

// =============================================================================
// MongoDB Implementation
// =============================================================================

pub struct MongoUserStore {
    users: MongoCollection<UserDoc>,
}

impl MongoUserStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: mongo.collection(USER_COLLECTION).await?,
        })
    }
}

#[async_trait::async_trait]
impl UserStore for MongoUserStore {
    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId> {
        self.users.insert_one(user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "user_id": user_id }).await
    }

    async fn list_users(&self, query: &UserListQuery) -> Result<(Vec<UserDoc>, u64)> {
        let mut filter = doc! {};
        if let Some(is_active) = query.is_active {
            filter.insert("is_active", is_active);
        }

        let total = self.users.count(filter.clone()).await?;

        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": -1, "user_id": 1 })
            .skip(query.skip())
            .limit(i64::from(query.limit))
            .build();
        let users = self.users.find_with(filter, options).await?;

        Ok((users, total))
    }

    async fn set_active(
        &self,
        user_id: &str,
        is_active: bool,
        reason: Option<String>,
    ) -> Result<bool> {
        let reason = if is_active { None } else { reason };
        let result = self
            .users
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$set": {
                        "is_active": is_active,
                        "suspended_reason": reason,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        Ok(result.matched_count > 0)
    }
}

// =============================================================================
// In-memory Implementation (dev mode and tests)
// =============================================================================

#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserDoc>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_user(&self, mut user: UserDoc) -> Result<ObjectId> {
        let id = ObjectId::new();
        user._id = Some(id);
        self.users.insert(user.user_id.clone(), user);
        Ok(id)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .get(user_id)
            .filter(|u| !u.metadata.is_deleted)
            .map(|u| u.value().clone()))
    }

    async fn list_users(&self, query: &UserListQuery) -> Result<(Vec<UserDoc>, u64)> {
        let mut matching: Vec<UserDoc> = self
            .users
            .iter()
            .filter(|u| !u.metadata.is_deleted)
            .filter(|u| query.is_active.map_or(true, |active| u.is_active == active))
            .map(|u| u.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.skip() as usize)
            .take(query.limit as usize)
            .collect();

        Ok((page, total))
    }

    async fn set_active(
        &self,
        user_id: &str,
        is_active: bool,
        reason: Option<String>,
    ) -> Result<bool> {
        match self.users.get_mut(user_id) {
            Some(mut user) if !user.metadata.is_deleted => {
                user.is_active = is_active;
                user.suspended_reason = if is_active { None } else { reason };
                user.metadata.touch();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parsing() {
        let q = UserListQuery::from_query_string(Some("page=3&limit=500&isActive=false"));
        assert_eq!(q.page, 3);
        assert_eq!(q.limit, UserListQuery::MAX_LIMIT);
        assert_eq!(q.is_active, Some(false));
        assert_eq!(q.skip(), 200);
    }

    #[test]
    fn test_query_defaults_on_garbage() {
        let q = UserListQuery::from_query_string(Some("page=zero&limit=-1&isActive=maybe"));
        assert_eq!(q, UserListQuery::default());
        assert_eq!(UserListQuery::from_query_string(None), UserListQuery::default());
    }

    #[tokio::test]
    async fn test_suspend_and_reactivate() {
        let store = MemoryUserStore::new();
        store.insert_user(UserDoc::new("u1", "Una")).await.unwrap();

        assert!(store
            .set_active("u1", false, Some("spam".into()))
            .await
            .unwrap());
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert!(!user.is_active);
        assert_eq!(user.suspended_reason.as_deref(), Some("spam"));

        assert!(store.set_active("u1", true, Some("ignored".into())).await.unwrap());
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert!(user.is_active);
        assert_eq!(user.suspended_reason, None);

        assert!(!store.set_active("ghost", false, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_users_paginates_and_filters() {
        let store = MemoryUserStore::new();
        for i in 0..5 {
            let mut user = UserDoc::new(format!("u{i}"), format!("User {i}"));
            user.metadata.created_at = Some(DateTime::from_millis(1_000 * i));
            store.insert_user(user).await.unwrap();
        }
        store.set_active("u4", false, None).await.unwrap();

        let (page, total) = store
            .list_users(&UserListQuery {
                page: 2,
                limit: 2,
                is_active: None,
            })
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            page.iter().map(|u| u.user_id.as_str()).collect::<Vec<_>>(),
            vec!["u2", "u1"]
        );

        let (active, total) = store
            .list_users(&UserListQuery {
                is_active: Some(true),
                ..UserListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert!(active.iter().all(|u| u.is_active));
    }

    #[tokio::test]
    async fn test_list_users_newest_first() {
        let store = MemoryUserStore::new();
        for (id, millis) in [("old", 1_000), ("new", 3_000), ("mid", 2_000), ("twin", 2_000)] {
            let mut user = UserDoc::new(id, id);
            user.metadata.created_at = Some(DateTime::from_millis(millis));
            store.insert_user(user).await.unwrap();
        }

        let (users, _) = store.list_users(&UserListQuery::default()).await.unwrap();
        assert_eq!(
            users.iter().map(|u| u.user_id.as_str()).collect::<Vec<_>>(),
            vec!["new", "mid", "twin", "old"]
        );
    }
}
