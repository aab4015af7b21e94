use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;

use crate::dtos::{
    ActivityEntry, ActivityResponse, AdminStatsResponse, MessageResponse, UserListParams,
    UserListResponse,
};
use crate::middleware::AdminUser;
use crate::models::User;
use crate::services::{
    accounts,
    search::{page_offset, DEFAULT_PAGE_SIZE},
    UserFilter,
};
use crate::AppState;

const ACTIVITY_LIMIT: u64 = 50;

pub async fn stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let total_users = state.users.count(&UserFilter::default()).await?;
    let active_users = state.users.count(&UserFilter::suspended(false)).await?;
    let total_files = state.files.count_all().await?;
    let storage_used = state.files.total_size(None).await?;

    Ok(Json(AdminStatsResponse {
        total_users,
        active_users,
        suspended_users: total_users.saturating_sub(active_users),
        total_files,
        storage_used,
        storage_limit: state.config.limits.storage_limit_bytes,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    page_offset(page, limit)?;

    let filter = UserFilter {
        suspended: None,
        name_contains: params
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    let total = state.users.count(&filter).await?;
    let users = state.users.list(&filter, page, limit).await?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
        total,
        page,
        limit,
    }))
}

/// Recent uploads across all accounts.
pub async fn activity(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let files = state.files.recent(ACTIVITY_LIMIT).await?;

    let mut names: HashMap<String, Option<String>> = HashMap::new();
    let mut activities = Vec::with_capacity(files.len());
    for file in files {
        if !names.contains_key(&file.owner_id) {
            let name = state.users.find_by_id(&file.owner_id).await?.map(|u| u.name);
            names.insert(file.owner_id.clone(), name);
        }
        activities.push(ActivityEntry {
            action: "File Upload",
            user: names.get(&file.owner_id).cloned().flatten(),
            user_id: file.owner_id,
            file_name: file.name,
            file_size: file.size,
            timestamp: file.created_at,
        });
    }

    Ok(Json(ActivityResponse { activities }))
}

async fn target_user(state: &AppState, admin_id: &str, user_id: &str) -> Result<User, AppError> {
    if admin_id == user_id {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Admins cannot perform this action on their own account"
        )));
    }
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))
}

async fn set_suspended(
    state: &AppState,
    admin_id: &str,
    user_id: &str,
    suspended: bool,
) -> Result<User, AppError> {
    let mut user = target_user(state, admin_id, user_id).await?;
    user.suspended = suspended;
    user.updated_at = Utc::now();
    if !state.users.update(&user).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    tracing::info!(
        admin_id = %admin_id,
        user_id = %user.id,
        suspended,
        "Account suspension changed"
    );
    Ok(user)
}

pub async fn suspend_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = set_suspended(&state, &admin.user_id, &user_id, true).await?;
    Ok(Json(MessageResponse::new(format!(
        "User {} suspended successfully",
        user.name
    ))))
}

pub async fn activate_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = set_suspended(&state, &admin.user_id, &user_id, false).await?;
    Ok(Json(MessageResponse::new(format!(
        "User {} activated successfully",
        user.name
    ))))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = target_user(&state, &admin.user_id, &user_id).await?;

    let summary = accounts::purge_account(
        state.users.as_ref(),
        state.files.as_ref(),
        state.objects.as_ref(),
        &user.id,
    )
    .await?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %user.id,
        files_removed = summary.files_removed,
        "Account deleted by admin"
    );

    Ok(Json(MessageResponse::new(format!(
        "User {} deleted successfully",
        user.name
    ))))
}
