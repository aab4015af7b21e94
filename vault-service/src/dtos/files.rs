use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::FileRecord;
use crate::services::search::SizeRangeOption;

/// File metadata as exposed over the API. The storage key stays internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub content_type: String,
    pub owner_id: String,
    pub download_count: i64,
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(f: FileRecord) -> Self {
        Self {
            id: f.id,
            name: f.name,
            size: f.size,
            content_type: f.content_type,
            owner_id: f.owner_id,
            download_count: f.download_count,
            checksum: f.checksum,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFileRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub link: String,
}

/// Query string of the file search routes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: Option<String>,
    pub file_types: Option<String>,
    pub date_range: Option<String>,
    pub size_range: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub files: Vec<FileResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct SearchFiltersResponse {
    pub file_types: Vec<String>,
    pub date_ranges: Vec<&'static str>,
    pub size_ranges: Vec<SizeRangeOption>,
}

/// Signed-URL parameters for `/storage/*key`.
#[derive(Debug, Deserialize)]
pub struct SignedObjectParams {
    pub expires: i64,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct OwnerSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct FileDetailsResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    pub owner: Option<OwnerSummary>,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct UpdateFileResponse {
    pub message: String,
    pub file: FileResponse,
}
