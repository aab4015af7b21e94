//! Multi-store removals with a fixed ordering.
//!
//! Bytes go first. If the object store refuses, the metadata is left in place so the
//! record still points at whatever remains and the caller can retry.

use service_core::error::AppError;

use crate::models::FileRecord;
use crate::services::{FileStore, ObjectStore, UserStore};

/// Remove one file: object, then record.
pub async fn remove_file(
    files: &dyn FileStore,
    objects: &dyn ObjectStore,
    file: &FileRecord,
) -> Result<(), AppError> {
    objects.delete(&file.storage_key).await.map_err(|e| {
        tracing::error!(
            file_id = %file.id,
            storage_key = %file.storage_key,
            error = %e,
            "Object delete failed; keeping file record"
        );
        e
    })?;

    files.delete_by_id(&file.id).await?;
    metrics::counter!("files_deleted_total").increment(1);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeSummary {
    pub files_removed: u64,
}

/// Remove an account: every owned object, then the file records, then the user.
///
/// Any object-store failure aborts before a single record is removed. Only the records
/// listed up front are deleted, so a file stored mid-purge keeps its record.
pub async fn purge_account(
    users: &dyn UserStore,
    files: &dyn FileStore,
    objects: &dyn ObjectStore,
    user_id: &str,
) -> Result<PurgeSummary, AppError> {
    let owned = files.list_by_owner(user_id).await?;

    for file in &owned {
        objects.delete(&file.storage_key).await.map_err(|e| {
            tracing::error!(
                user_id = %user_id,
                file_id = %file.id,
                error = %e,
                "Object delete failed during account removal"
            );
            e
        })?;
    }

    let mut files_removed = 0;
    for file in &owned {
        if files.delete_by_id(&file.id).await? {
            files_removed += 1;
        }
    }
    if !users.delete_by_id(user_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    metrics::counter!("files_deleted_total").increment(files_removed);
    tracing::info!(user_id = %user_id, files_removed, "Account removed");

    Ok(PurgeSummary { files_removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::services::{InMemoryFileStore, InMemoryStorage, InMemoryUserStore, LocalUrlSigner};

    type Stores = (InMemoryUserStore, InMemoryFileStore, InMemoryStorage, User, Vec<FileRecord>);

    fn record(owner: &User, name: &str, key: String) -> FileRecord {
        FileRecord::new(
            owner.id.clone(),
            name.to_string(),
            "text/plain".to_string(),
            1,
            key,
            None,
        )
    }

    /// Stores a new upload for `owner` the first time an object is deleted.
    struct UploadDuringDelete<'a> {
        inner: &'a InMemoryStorage,
        files: &'a InMemoryFileStore,
        late: FileRecord,
        done: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl ObjectStore for UploadDuringDelete<'_> {
        async fn put(&self, key: &str, data: Vec<u8>, ct: &str) -> Result<String, AppError> {
            self.inner.put(key, data, ct).await
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            if !self.done.swap(true, std::sync::atomic::Ordering::SeqCst) {
                let late = &self.late;
                self.inner.put(&late.storage_key, b"y".to_vec(), "text/plain").await?;
                self.files.insert(late).await?;
            }
            self.inner.delete(key).await
        }

        async fn signed_get_url(&self, key: &str, ttl_seconds: u64) -> Result<String, AppError> {
            self.inner.signed_get_url(key, ttl_seconds).await
        }

        async fn health_check(&self) -> Result<(), AppError> {
            self.inner.health_check().await
        }

        fn backend(&self) -> &'static str {
            self.inner.backend()
        }
    }

    async fn seeded() -> Stores {
        let users = InMemoryUserStore::new();
        let files = InMemoryFileStore::new();
        let objects = InMemoryStorage::new(LocalUrlSigner::new("http://localhost", "s"));

        let user = User::new("Ada".to_string(), "ada@example.com", "h".to_string());
        users.insert(&user).await.unwrap();

        let mut records = Vec::new();
        for name in ["a.txt", "b.txt"] {
            let key = format!("{}/{}", user.id, name);
            objects.put(&key, b"x".to_vec(), "text/plain").await.unwrap();
            let record = record(&user, name, key);
            files.insert(&record).await.unwrap();
            records.push(record);
        }
        (users, files, objects, user, records)
    }

    #[tokio::test]
    async fn test_remove_file_keeps_record_when_object_delete_fails() {
        let (_users, files, objects, _user, records) = seeded().await;
        objects.set_fail_deletes(true);

        let err = remove_file(&files, &objects, &records[0]).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamFailure(_)));
        assert!(files.find_by_id(&records[0].id).await.unwrap().is_some());
        assert!(objects.contains(&records[0].storage_key));
    }

    #[tokio::test]
    async fn test_purge_account_removes_everything() {
        let (users, files, objects, user, _records) = seeded().await;

        let summary = purge_account(&users, &files, &objects, &user.id).await.unwrap();
        assert_eq!(summary.files_removed, 2);
        assert!(objects.is_empty());
        assert_eq!(files.count_all().await.unwrap(), 0);
        assert!(users.find_by_id(&user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_account_aborts_on_object_failure() {
        let (users, files, objects, user, _records) = seeded().await;
        objects.set_fail_deletes(true);

        assert!(purge_account(&users, &files, &objects, &user.id).await.is_err());
        assert_eq!(files.count_all().await.unwrap(), 2);
        assert!(users.find_by_id(&user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_account_keeps_file_stored_mid_purge() {
        let (users, files, objects, user, _records) = seeded().await;
        let late = record(&user, "late.txt", format!("{}/late.txt", user.id));
        let racing = UploadDuringDelete {
            inner: &objects,
            files: &files,
            late: late.clone(),
            done: std::sync::atomic::AtomicBool::new(false),
        };

        let summary = purge_account(&users, &files, &racing, &user.id).await.unwrap();
        assert_eq!(summary.files_removed, 2);
        assert_eq!(files.count_all().await.unwrap(), 1);
        assert!(files.find_by_id(&late.id).await.unwrap().is_some());
        assert!(objects.contains(&late.storage_key));
    }
}
