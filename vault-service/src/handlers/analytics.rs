use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use service_core::error::AppError;

use crate::dtos::{
    ActivityParams, FileTypesResponse, StorageUsageResponse, UserActivityEntry,
    UserActivityResponse,
};
use crate::middleware::AuthUser;
use crate::services::FileQuery;
use crate::AppState;

const DEFAULT_ACTIVITY_DAYS: i64 = 30;

/// Usage of the caller's own files against the configured quota.
pub async fn storage_usage(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let storage_used = state.files.total_size(Some(&ctx.user_id)).await?;
    let file_count = state.files.count(&FileQuery::for_owner(&ctx.user_id)).await?;
    let storage_limit = state.config.limits.storage_limit_bytes;

    Ok(Json(StorageUsageResponse {
        storage_used,
        storage_limit,
        remaining_storage: (storage_limit - storage_used).max(0),
        file_count,
    }))
}

pub async fn file_types(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let file_types = state.files.type_breakdown(&ctx.user_id).await?;
    Ok(Json(FileTypesResponse { file_types }))
}

/// Uploads in `[startDate, endDate]`, or the last 30 days.
pub async fn user_activity(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<ActivityParams>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let (start, end) = params
        .window()?
        .unwrap_or((now - Duration::days(DEFAULT_ACTIVITY_DAYS), now));

    let query = FileQuery::for_owner(&ctx.user_id).created_between(start, Some(end));
    let files = state.files.find(&query).await?;

    let activities = files
        .into_iter()
        .map(|f| UserActivityEntry {
            action: "File Upload",
            file_id: f.id,
            file_name: f.name,
            file_size: f.size,
            timestamp: f.created_at,
        })
        .collect();

    Ok(Json(UserActivityResponse {
        start_date: start,
        end_date: end,
        activities,
    }))
}
