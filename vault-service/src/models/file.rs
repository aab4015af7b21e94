use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for a stored object. The bytes live in the object store under `storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub storage_key: String,
    pub size: i64,
    pub content_type: String,
    pub owner_id: String,
    #[serde(default)]
    pub download_count: i64,
    pub checksum: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        owner_id: String,
        name: String,
        content_type: String,
        size: i64,
        storage_key: String,
        checksum: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            storage_key,
            size,
            content_type,
            owner_id,
            download_count: 0,
            checksum,
            created_at: now,
            updated_at: now,
        }
    }
}
