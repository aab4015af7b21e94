//! DashMap-backed stores for tests and `STORAGE_BACKEND=memory` development runs.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use service_core::error::AppError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::{FileRecord, User};
use crate::services::files::{FileStore, TypeBreakdown};
use crate::services::search::FileQuery;
use crate::services::users::{UserFilter, UserStore};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, User>,
    unavailable: AtomicBool,
    drop_next_update: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `UpstreamFailure`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Remove the targeted account when the next `update` arrives, as a concurrent
    /// delete would.
    pub fn drop_next_update(&self) {
        self.drop_next_update.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::upstream(
                "Credential store unavailable",
                "injected failure",
            ));
        }
        Ok(())
    }

    fn email_taken(&self, email: &str, except_id: &str) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && u.id != except_id)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.check()?;
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.check()?;
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        self.check()?;
        if self.email_taken(&user.email, &user.id) || self.users.contains_key(&user.id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Email already registered"
            )));
        }
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<bool, AppError> {
        self.check()?;
        if self.drop_next_update.swap(false, Ordering::SeqCst) {
            self.users.remove(&user.id);
        }
        if !self.users.contains_key(&user.id) {
            return Ok(false);
        }
        if self.email_taken(&user.email, &user.id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Email already registered"
            )));
        }
        self.users.insert(user.id.clone(), user.clone());
        Ok(true)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        self.check()?;
        Ok(self.users.remove(id).is_some())
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, AppError> {
        self.check()?;
        Ok(self.users.iter().filter(|u| filter.matches(u)).count() as u64)
    }

    async fn list(
        &self,
        filter: &UserFilter,
        page: u64,
        limit: u64,
    ) -> Result<Vec<User>, AppError> {
        self.check()?;
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| filter.matches(u))
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = page.saturating_sub(1).saturating_mul(limit);
        Ok(users
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect())
    }

    async fn all(&self) -> Result<Vec<User>, AppError> {
        self.check()?;
        Ok(self.users.iter().map(|u| u.clone()).collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check()
    }
}

#[derive(Default)]
pub struct InMemoryFileStore {
    files: DashMap<String, FileRecord>,
    fail_inserts: AtomicBool,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Vec<FileRecord> {
        self.files.iter().map(|f| f.clone()).collect()
    }

    fn owned_by(&self, owner_id: &str) -> Vec<FileRecord> {
        self.files
            .iter()
            .filter(|f| f.owner_id == owner_id)
            .map(|f| f.clone())
            .collect()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn insert(&self, file: &FileRecord) -> Result<(), AppError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::upstream(
                "Failed to insert file record",
                "injected failure",
            ));
        }
        self.files.insert(file.id.clone(), file.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        Ok(self.files.get(id).map(|f| f.clone()))
    }

    async fn update(&self, file: &FileRecord) -> Result<bool, AppError> {
        match self.files.get_mut(&file.id) {
            Some(mut entry) => {
                *entry = file.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.files.remove(id).is_some())
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<u64, AppError> {
        let before = self.files.len();
        self.files.retain(|_, f| f.owner_id != owner_id);
        Ok((before - self.files.len()) as u64)
    }

    async fn find(&self, query: &FileQuery) -> Result<Vec<FileRecord>, AppError> {
        Ok(query.apply(self.owned_by(&query.owner_id)))
    }

    async fn count(&self, query: &FileQuery) -> Result<u64, AppError> {
        Ok(self.files.iter().filter(|f| query.matches(f)).count() as u64)
    }

    async fn total_size(&self, owner_id: Option<&str>) -> Result<i64, AppError> {
        Ok(self
            .files
            .iter()
            .filter(|f| owner_id.map_or(true, |owner| f.owner_id == owner))
            .map(|f| f.size)
            .sum())
    }

    async fn count_all(&self) -> Result<u64, AppError> {
        Ok(self.files.len() as u64)
    }

    async fn distinct_types(&self, owner_id: &str) -> Result<Vec<String>, AppError> {
        let types: BTreeSet<String> = self
            .owned_by(owner_id)
            .into_iter()
            .map(|f| f.content_type)
            .collect();
        Ok(types.into_iter().collect())
    }

    async fn type_breakdown(&self, owner_id: &str) -> Result<Vec<TypeBreakdown>, AppError> {
        let mut groups: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for file in self.owned_by(owner_id) {
            let entry = groups.entry(file.content_type).or_default();
            entry.0 += 1;
            entry.1 += file.size;
        }
        let mut breakdown: Vec<TypeBreakdown> = groups
            .into_iter()
            .map(|(content_type, (count, total_size))| TypeBreakdown {
                content_type,
                count,
                total_size,
            })
            .collect();
        // Stable sort keeps the content-type order for equal counts.
        breakdown.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(breakdown)
    }

    async fn recent(&self, limit: u64) -> Result<Vec<FileRecord>, AppError> {
        let mut files = self.snapshot();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        files.truncate(limit as usize);
        Ok(files)
    }

    async fn increment_downloads(&self, id: &str) -> Result<bool, AppError> {
        match self.files.get_mut(id) {
            Some(mut entry) => {
                entry.download_count += 1;
                entry.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn all(&self) -> Result<Vec<FileRecord>, AppError> {
        Ok(self.snapshot())
    }
}
