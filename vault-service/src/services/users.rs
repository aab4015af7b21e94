use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
    Collection,
};
use service_core::error::AppError;

use crate::models::User;
use crate::services::database::MongoDb;

/// Duplicate key error code reported by MongoDB for unique index violations.
pub(crate) const DUPLICATE_KEY: i32 = 11000;

/// Admin-side listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub suspended: Option<bool>,
    /// Case-insensitive substring of name or email.
    pub name_contains: Option<String>,
}

impl UserFilter {
    pub fn suspended(suspended: bool) -> Self {
        Self {
            suspended: Some(suspended),
            name_contains: None,
        }
    }

    pub fn to_filter(&self) -> Document {
        let mut filter = Document::new();
        if let Some(suspended) = self.suspended {
            filter.insert("suspended", suspended);
        }
        if let Some(needle) = &self.name_contains {
            let pattern = regex::escape(needle);
            filter.insert(
                "$or",
                vec![
                    doc! { "name": { "$regex": &pattern, "$options": "i" } },
                    doc! { "email": { "$regex": &pattern, "$options": "i" } },
                ],
            );
        }
        filter
    }

    pub fn matches(&self, user: &User) -> bool {
        if self.suspended.is_some_and(|s| s != user.suspended) {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            let needle = needle.to_lowercase();
            return user.name.to_lowercase().contains(&needle)
                || user.email.to_lowercase().contains(&needle);
        }
        true
    }
}

/// Credential store: the authoritative source of account state.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Fails with `Conflict` if the email is already registered.
    async fn insert(&self, user: &User) -> Result<(), AppError>;
    /// Replace the stored account. Returns `false` if it no longer exists.
    async fn update(&self, user: &User) -> Result<bool, AppError>;
    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError>;
    async fn count(&self, filter: &UserFilter) -> Result<u64, AppError>;
    /// Newest first.
    async fn list(&self, filter: &UserFilter, page: u64, limit: u64)
        -> Result<Vec<User>, AppError>;
    async fn all(&self) -> Result<Vec<User>, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

pub struct MongoUserStore {
    db: MongoDb,
    collection: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: MongoDb) -> Self {
        let collection = db.users();
        Self { db, collection }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.collection
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| AppError::upstream("Failed to load user", e))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.collection
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(|e| AppError::upstream("Failed to look up user by email", e))
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        self.collection
            .insert_one(user, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict(anyhow::anyhow!("Email already registered"))
                } else {
                    tracing::error!(error = %e, "Failed to insert user");
                    AppError::upstream("Failed to insert user", e)
                }
            })?;
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<bool, AppError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": &user.id }, user, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict(anyhow::anyhow!("Email already registered"))
                } else {
                    AppError::upstream("Failed to update user", e)
                }
            })?;
        Ok(result.matched_count > 0)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| AppError::upstream("Failed to delete user", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, AppError> {
        self.collection
            .count_documents(filter.to_filter(), None)
            .await
            .map_err(|e| AppError::upstream("Failed to count users", e))
    }

    async fn list(
        &self,
        filter: &UserFilter,
        page: u64,
        limit: u64,
    ) -> Result<Vec<User>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.saturating_sub(1).saturating_mul(limit))
            .limit(limit as i64)
            .build();

        let cursor = self
            .collection
            .find(filter.to_filter(), options)
            .await
            .map_err(|e| AppError::upstream("Failed to list users", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::upstream("Failed to read users", e))
    }

    async fn all(&self) -> Result<Vec<User>, AppError> {
        let cursor = self
            .collection
            .find(doc! {}, None)
            .await
            .map_err(|e| AppError::upstream("Failed to export users", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::upstream("Failed to read users", e))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.db.health_check().await
    }
}
