use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SanitizedUser;

#[derive(Debug, Serialize)]
pub struct AdminStatsResponse {
    pub total_users: u64,
    pub active_users: u64,
    pub suspended_users: u64,
    pub total_files: u64,
    pub storage_used: i64,
    pub storage_limit: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<SanitizedUser>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    pub action: &'static str,
    pub user_id: String,
    pub user: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub activities: Vec<ActivityEntry>,
}
