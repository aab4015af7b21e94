use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::FindOptions,
    Collection,
};
use serde::Serialize;
use service_core::error::AppError;

use crate::models::FileRecord;
use crate::services::database::MongoDb;
use crate::services::search::FileQuery;

/// Per-content-type totals for one owner.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TypeBreakdown {
    pub content_type: String,
    pub count: i64,
    pub total_size: i64,
}

/// Metadata store for uploaded files.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn insert(&self, file: &FileRecord) -> Result<(), AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, AppError>;
    async fn update(&self, file: &FileRecord) -> Result<bool, AppError>;
    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError>;
    async fn delete_by_owner(&self, owner_id: &str) -> Result<u64, AppError>;
    /// Filtered, sorted and paged. A zero `limit` returns every match.
    async fn find(&self, query: &FileQuery) -> Result<Vec<FileRecord>, AppError>;
    async fn count(&self, query: &FileQuery) -> Result<u64, AppError>;
    /// Sum of `size`, optionally restricted to one owner.
    async fn total_size(&self, owner_id: Option<&str>) -> Result<i64, AppError>;
    async fn count_all(&self) -> Result<u64, AppError>;
    async fn distinct_types(&self, owner_id: &str) -> Result<Vec<String>, AppError>;
    /// Sorted by count, descending.
    async fn type_breakdown(&self, owner_id: &str) -> Result<Vec<TypeBreakdown>, AppError>;
    /// Most recently created files across all owners.
    async fn recent(&self, limit: u64) -> Result<Vec<FileRecord>, AppError>;
    async fn increment_downloads(&self, id: &str) -> Result<bool, AppError>;
    async fn all(&self) -> Result<Vec<FileRecord>, AppError>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError> {
        self.find(&FileQuery::for_owner(owner_id)).await
    }
}

pub struct MongoFileStore {
    collection: Collection<FileRecord>,
}

impl MongoFileStore {
    pub fn new(db: &MongoDb) -> Self {
        Self {
            collection: db.files(),
        }
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, AppError> {
        let cursor = self
            .collection
            .aggregate(pipeline, None)
            .await
            .map_err(|e| AppError::upstream("File aggregation failed", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::upstream("Failed to read aggregation results", e))
    }

    async fn collect(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<FileRecord>, AppError> {
        let cursor = self
            .collection
            .find(filter, options)
            .await
            .map_err(|e| AppError::upstream("Failed to query files", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::upstream("Failed to read files", e))
    }
}

/// `$sum` yields Int32, Int64 or Double depending on the inputs.
fn bson_number(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

#[async_trait]
impl FileStore for MongoFileStore {
    async fn insert(&self, file: &FileRecord) -> Result<(), AppError> {
        self.collection
            .insert_one(file, None)
            .await
            .map_err(|e| AppError::upstream("Failed to insert file record", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        self.collection
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| AppError::upstream("Failed to load file record", e))
    }

    async fn update(&self, file: &FileRecord) -> Result<bool, AppError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": &file.id }, file, None)
            .await
            .map_err(|e| AppError::upstream("Failed to update file record", e))?;
        Ok(result.matched_count > 0)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| AppError::upstream("Failed to delete file record", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<u64, AppError> {
        let result = self
            .collection
            .delete_many(doc! { "owner_id": owner_id }, None)
            .await
            .map_err(|e| AppError::upstream("Failed to delete file records", e))?;
        Ok(result.deleted_count)
    }

    async fn find(&self, query: &FileQuery) -> Result<Vec<FileRecord>, AppError> {
        let mut options = FindOptions::builder()
            .sort(query.sort_document())
            .skip(query.skip())
            .build();
        if query.limit > 0 {
            options.limit = Some(query.limit as i64);
        }
        self.collect(query.to_filter(), Some(options)).await
    }

    async fn count(&self, query: &FileQuery) -> Result<u64, AppError> {
        self.collection
            .count_documents(query.to_filter(), None)
            .await
            .map_err(|e| AppError::upstream("Failed to count files", e))
    }

    async fn total_size(&self, owner_id: Option<&str>) -> Result<i64, AppError> {
        let mut pipeline = Vec::new();
        if let Some(owner_id) = owner_id {
            pipeline.push(doc! { "$match": { "owner_id": owner_id } });
        }
        pipeline.push(doc! { "$group": { "_id": Bson::Null, "total_size": { "$sum": "$size" } } });

        let results = self.aggregate(pipeline).await?;
        Ok(results
            .first()
            .map(|d| bson_number(d.get("total_size")))
            .unwrap_or(0))
    }

    async fn count_all(&self) -> Result<u64, AppError> {
        self.collection
            .count_documents(doc! {}, None)
            .await
            .map_err(|e| AppError::upstream("Failed to count files", e))
    }

    async fn distinct_types(&self, owner_id: &str) -> Result<Vec<String>, AppError> {
        let values = self
            .collection
            .distinct("content_type", doc! { "owner_id": owner_id }, None)
            .await
            .map_err(|e| AppError::upstream("Failed to list file types", e))?;

        let mut types: Vec<String> = values
            .into_iter()
            .filter_map(|v| match v {
                Bson::String(s) => Some(s),
                _ => None,
            })
            .collect();
        types.sort();
        Ok(types)
    }

    async fn type_breakdown(&self, owner_id: &str) -> Result<Vec<TypeBreakdown>, AppError> {
        let pipeline = vec![
            doc! { "$match": { "owner_id": owner_id } },
            doc! { "$group": {
                "_id": "$content_type",
                "count": { "$sum": 1 },
                "total_size": { "$sum": "$size" },
            } },
            doc! { "$sort": { "count": -1, "_id": 1 } },
        ];

        let results = self.aggregate(pipeline).await?;
        Ok(results
            .into_iter()
            .map(|d| TypeBreakdown {
                content_type: d.get_str("_id").unwrap_or_default().to_string(),
                count: bson_number(d.get("count")),
                total_size: bson_number(d.get("total_size")),
            })
            .collect())
    }

    async fn recent(&self, limit: u64) -> Result<Vec<FileRecord>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit as i64)
            .build();
        self.collect(doc! {}, Some(options)).await
    }

    async fn increment_downloads(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$inc": { "download_count": 1_i64 },
                    "$set": { "updated_at": Bson::DateTime(Utc::now().into()) },
                },
                None,
            )
            .await
            .map_err(|e| AppError::upstream("Failed to record download", e))?;
        Ok(result.matched_count > 0)
    }

    async fn all(&self) -> Result<Vec<FileRecord>, AppError> {
        self.collect(doc! {}, None).await
    }
}
